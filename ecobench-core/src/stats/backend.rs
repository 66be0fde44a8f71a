// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistical backends.
//!
//! A backend supplies distribution quantiles and tail probabilities. The
//! `statrs` backend runs every test; the approximate backend keeps
//! descriptive statistics usable with a fixed critical value and skips
//! inferential tests.

use tracing::warn;

use super::descriptive::{mean, std_dev, ConfidenceInterval};
use super::inference::{OmnibusResult, PairwiseResult, WelchResult};
use super::metric::MetricSeries;
use super::FALLBACK_CRITICAL_VALUE;

const SKIPPED: &str = "statistics backend unavailable; inferential test skipped";

pub trait StatsBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether inferential tests can run.
    fn is_available(&self) -> bool;

    /// Two-sided 95% critical value at `df` degrees of freedom.
    fn critical_value(&self, df: f64) -> f64;

    /// 95% interval around the sample mean. `None` below two observations.
    fn compute_confidence_interval(&self, values: &[f64]) -> Option<ConfidenceInterval> {
        let sd = std_dev(values)?;
        let n = values.len() as f64;
        let critical_value = self.critical_value(n - 1.0);
        let half = critical_value * sd / n.sqrt();
        let m = mean(values);
        Some(ConfidenceInterval {
            lower: m - half,
            upper: m + half,
            critical_value,
            approximate: !self.is_available(),
        })
    }

    fn run_omnibus_test(&self, series: &MetricSeries) -> OmnibusResult;

    fn run_pairwise_tests(&self, series: &MetricSeries) -> Vec<PairwiseResult>;

    fn welch(&self, a: &[f64], b: &[f64]) -> WelchResult;
}

/// Descriptive-only backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateBackend;

impl StatsBackend for ApproximateBackend {
    fn name(&self) -> &'static str {
        "approximate"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn critical_value(&self, _df: f64) -> f64 {
        FALLBACK_CRITICAL_VALUE
    }

    fn run_omnibus_test(&self, series: &MetricSeries) -> OmnibusResult {
        warn!(metric = %series.metric(), "{}", SKIPPED);
        OmnibusResult::skipped(SKIPPED)
    }

    fn run_pairwise_tests(&self, series: &MetricSeries) -> Vec<PairwiseResult> {
        warn!(metric = %series.metric(), "{}", SKIPPED);
        Vec::new()
    }

    fn welch(&self, _a: &[f64], _b: &[f64]) -> WelchResult {
        WelchResult::skipped(SKIPPED)
    }
}

#[cfg(feature = "statrs")]
pub use self::statrs_backend::StatrsBackend;

#[cfg(feature = "statrs")]
mod statrs_backend {
    use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

    use super::*;
    use crate::stats::inference::{one_way_anova, pairwise_tests, welch_t_test};

    /// Exact t and F distributions from `statrs`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct StatrsBackend;

    fn t_two_tailed(t: f64, df: f64) -> Option<f64> {
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        Some(((1.0 - dist.cdf(t.abs())) * 2.0).clamp(0.0, 1.0))
    }

    fn f_upper_tail(f: f64, df_between: f64, df_within: f64) -> Option<f64> {
        let dist = FisherSnedecor::new(df_between, df_within).ok()?;
        Some((1.0 - dist.cdf(f)).clamp(0.0, 1.0))
    }

    impl StatsBackend for StatrsBackend {
        fn name(&self) -> &'static str {
            "statrs"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn critical_value(&self, df: f64) -> f64 {
            StudentsT::new(0.0, 1.0, df)
                .map(|dist| dist.inverse_cdf(0.975))
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(FALLBACK_CRITICAL_VALUE)
        }

        fn run_omnibus_test(&self, series: &MetricSeries) -> OmnibusResult {
            one_way_anova(series, &f_upper_tail)
        }

        fn run_pairwise_tests(&self, series: &MetricSeries) -> Vec<PairwiseResult> {
            pairwise_tests(series, &t_two_tailed)
        }

        fn welch(&self, a: &[f64], b: &[f64]) -> WelchResult {
            welch_t_test(a, b, &t_two_tailed)
        }
    }
}

/// Pick the best backend compiled in. Called once per analysis pass.
pub fn select_backend() -> Box<dyn StatsBackend> {
    #[cfg(feature = "statrs")]
    let backend: Box<dyn StatsBackend> = Box::new(StatrsBackend);

    #[cfg(not(feature = "statrs"))]
    let backend: Box<dyn StatsBackend> = {
        warn!("No statistics backend compiled in; confidence intervals use a fixed critical value of 2.0 and significance tests are skipped");
        Box::new(ApproximateBackend)
    };

    tracing::info!(
        backend = backend.name(),
        inferential = backend.is_available(),
        "Statistics backend selected"
    );
    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_backend() {
        let backend = ApproximateBackend;
        assert!(!backend.is_available());
        assert_eq!(backend.critical_value(4.0), 2.0);
        let welch = backend.welch(&[1.0, 2.0], &[3.0, 4.0]);
        assert_eq!(welch.significance, crate::stats::Significance::Untested);
        assert!(backend
            .run_pairwise_tests(&MetricSeries::new(crate::stats::Metric::EmissionsG))
            .is_empty());
    }

    #[cfg(feature = "statrs")]
    #[test]
    fn test_statrs_critical_value() {
        let backend = StatrsBackend;
        // t(0.975, 4) = 2.776
        assert!((backend.critical_value(4.0) - 2.776).abs() < 1e-3);
        let ci = backend.compute_confidence_interval(&[1.0, 2.0, 3.0]).unwrap();
        assert!(!ci.approximate);
    }
}
