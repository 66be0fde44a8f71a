// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistics engine.
//!
//! Works on an immutable snapshot of loaded run records. Every analysis pass
//! recomputes its series and comparisons from scratch.

pub mod backend;
pub mod descriptive;
pub mod inference;
pub mod metric;
pub mod winner;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

pub use backend::{select_backend, ApproximateBackend, StatsBackend};
#[cfg(feature = "statrs")]
pub use backend::StatrsBackend;
pub use descriptive::{ConfidenceInterval, DescriptiveStats};
pub use inference::{
    bonferroni, cohens_d, EffectSize, OmnibusResult, PairwiseResult, Significance,
    StatisticalComparison, WelchResult,
};
pub use metric::{detect_repetitions, slices, Direction, Metric, MetricSeries};
pub use winner::{determine_winner, WinnerDetermination};

use crate::record::RunRecord;
use crate::types::SubjectId;

/// Significance level for every test.
pub const ALPHA: f64 = 0.05;

/// Critical value used when no t distribution is available.
pub const FALLBACK_CRITICAL_VALUE: f64 = 2.0;

/// Everything derived for one metric over one set of records.
#[derive(Debug, Clone, Serialize)]
pub struct MetricAnalysis {
    pub metric: Metric,
    pub descriptive: BTreeMap<SubjectId, DescriptiveStats>,
    pub comparison: StatisticalComparison,
    pub winner: Option<WinnerDetermination>,
}

pub struct StatisticsEngine {
    backend: Box<dyn StatsBackend>,
}

impl StatisticsEngine {
    pub fn new(backend: Box<dyn StatsBackend>) -> Self {
        Self { backend }
    }

    /// Engine over the best compiled-in backend.
    pub fn with_default_backend() -> Self {
        Self::new(select_backend())
    }

    pub fn backend(&self) -> &dyn StatsBackend {
        self.backend.as_ref()
    }

    /// Whether inferential output is worth reporting for `records`.
    pub fn inferential_ready(&self, records: &[RunRecord]) -> bool {
        self.backend.is_available() && detect_repetitions(records) >= 2
    }

    /// Descriptive statistics per subject.
    pub fn describe(&self, series: &MetricSeries) -> BTreeMap<SubjectId, DescriptiveStats> {
        series
            .iter()
            .filter_map(|(subject, values)| {
                DescriptiveStats::compute(values, self.backend())
                    .map(|stats| (subject.clone(), stats))
            })
            .collect()
    }

    /// ANOVA plus corrected pairwise tests.
    pub fn compare(&self, series: &MetricSeries) -> StatisticalComparison {
        StatisticalComparison {
            omnibus: self.backend.run_omnibus_test(series),
            pairwise: self.backend.run_pairwise_tests(series),
        }
    }

    /// Full analysis of `metric` over records of one load/endpoint slice.
    pub fn analyze(&self, metric: Metric, records: &[&RunRecord]) -> MetricAnalysis {
        let series = MetricSeries::from_records(metric, records.iter().copied());
        debug!(
            metric = %metric,
            subjects = series.len(),
            backend = self.backend.name(),
            "Analyzing metric"
        );
        MetricAnalysis {
            metric,
            descriptive: self.describe(&series),
            comparison: self.compare(&series),
            winner: determine_winner(metric, records, self.backend()),
        }
    }
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::with_default_backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;

    #[test]
    fn test_engine_degrades_without_backend() {
        let engine = StatisticsEngine::new(Box::new(ApproximateBackend));
        let mut records = Vec::new();
        for (subject, rps) in [("a", [100.0, 110.0]), ("b", [200.0, 190.0])] {
            for (i, v) in rps.iter().enumerate() {
                let mut r = record(subject, 10, "light");
                r.run_index = Some(i as u32 + 1);
                r.requests_per_second = *v;
                records.push(r);
            }
        }
        assert!(!engine.inferential_ready(&records));

        let refs: Vec<_> = records.iter().collect();
        let analysis = engine.analyze(Metric::RequestsPerSecond, &refs);
        assert_eq!(analysis.descriptive.len(), 2);
        assert!(analysis.descriptive.values().all(|d| d.ci95.unwrap().approximate));
        assert_eq!(analysis.comparison.omnibus.significance, Significance::Untested);
        assert!(analysis.comparison.pairwise.is_empty());
        assert_eq!(analysis.winner.unwrap().winner.as_str(), "b");
    }

    #[cfg(feature = "statrs")]
    #[test]
    fn test_engine_with_statrs() {
        let engine = StatisticsEngine::new(Box::new(StatrsBackend));
        let mut records = Vec::new();
        for (subject, values) in [
            ("a", [10.0, 10.4, 9.6, 10.1]),
            ("b", [20.0, 20.3, 19.8, 20.1]),
            ("c", [30.0, 29.7, 30.2, 30.4]),
        ] {
            for (i, v) in values.iter().enumerate() {
                let mut r = record(subject, 10, "light");
                r.run_index = Some(i as u32 + 1);
                r.response_time_stats.mean_ms = *v;
                records.push(r);
            }
        }
        assert!(engine.inferential_ready(&records));

        let refs: Vec<_> = records.iter().collect();
        let analysis = engine.analyze(Metric::MeanResponseMs, &refs);
        assert_eq!(analysis.comparison.omnibus.significance, Significance::Significant);
        assert_eq!(analysis.comparison.pairwise.len(), 3);
        assert!(analysis
            .comparison
            .pairwise
            .iter()
            .all(|p| p.effect == EffectSize::Large));
        assert!(analysis.winner.unwrap().statement.starts_with("[SIG]"));
    }
}
