// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Qualified winner statements.

use serde::Serialize;

use super::backend::StatsBackend;
use super::descriptive::mean;
use super::inference::{Significance, WelchResult};
use super::metric::{Metric, MetricSeries};
use crate::record::RunRecord;
use crate::reliability::ReliabilityBreakdown;
use crate::types::SubjectId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerDetermination {
    pub metric: Metric,
    pub winner: SubjectId,
    pub winner_mean: f64,
    pub runner_up: Option<(SubjectId, f64)>,
    pub significance: Significance,
    pub p_value: Option<f64>,
    pub statement: String,
    pub caveat: Option<String>,
}

/// Pick the best subject for `metric` among `records` and qualify the claim.
///
/// `None` when no record has a value for the metric.
pub fn determine_winner(
    metric: Metric,
    records: &[&RunRecord],
    backend: &dyn StatsBackend,
) -> Option<WinnerDetermination> {
    let series = MetricSeries::from_records(metric, records.iter().copied());
    let direction = metric.direction();

    let mut ranked: Vec<(&SubjectId, &[f64], f64)> =
        series.iter().map(|(s, v)| (s, v, mean(v))).collect();
    ranked.sort_by(|a, b| {
        if direction.prefers(a.2, b.2) {
            std::cmp::Ordering::Less
        } else if direction.prefers(b.2, a.2) {
            std::cmp::Ordering::Greater
        } else {
            a.0.cmp(b.0)
        }
    });

    let (winner, winner_values, winner_mean) = *ranked.first()?;

    let Some(&(runner_up, runner_values, runner_mean)) = ranked.get(1) else {
        return Some(WinnerDetermination {
            metric,
            winner: winner.clone(),
            winner_mean,
            runner_up: None,
            significance: Significance::Untested,
            p_value: None,
            statement: format!(
                "{} is the only subject measured for {} (mean {:.4}); no comparison possible",
                winner, metric, winner_mean
            ),
            caveat: None,
        });
    };

    let welch = backend.welch(winner_values, runner_values);
    let statement = qualify(metric, winner, winner_mean, runner_up, runner_mean, &welch);

    let compared = records
        .iter()
        .copied()
        .filter(|r| &r.subject == winner || &r.subject == runner_up);
    let caveat = metric
        .is_energy()
        .then(|| reliability_caveat(&ReliabilityBreakdown::from_records(compared)))
        .flatten();

    Some(WinnerDetermination {
        metric,
        winner: winner.clone(),
        winner_mean,
        runner_up: Some((runner_up.clone(), runner_mean)),
        significance: welch.significance,
        p_value: welch.p_value,
        statement,
        caveat,
    })
}

fn qualify(
    metric: Metric,
    winner: &SubjectId,
    winner_mean: f64,
    runner_up: &SubjectId,
    runner_mean: f64,
    welch: &WelchResult,
) -> String {
    let claim = format!(
        "{} has the {} {} (mean {:.4} vs {:.4} for {})",
        winner,
        metric.direction().superlative(),
        metric,
        winner_mean,
        runner_mean,
        runner_up
    );
    match (welch.significance, welch.p_value) {
        (Significance::Significant, Some(p)) => {
            format!("{} {}, p = {:.4}", Significance::Significant.tag(), claim, p)
        }
        (Significance::NotSignificant, Some(p)) => format!(
            "{} {}, but the difference is not statistically significant (p = {:.4})",
            Significance::NotSignificant.tag(),
            claim,
            p
        ),
        (Significance::NotSignificant, None) => format!(
            "{} {}, but significance could not be established ({})",
            Significance::NotSignificant.tag(),
            claim,
            welch.diagnostic.as_deref().unwrap_or("degenerate input")
        ),
        _ => format!(
            "{} (significance not tested: {})",
            claim,
            welch.diagnostic.as_deref().unwrap_or("no backend")
        ),
    }
}

/// Caveat for energy claims resting on short measurements.
pub fn reliability_caveat(breakdown: &ReliabilityBreakdown) -> Option<String> {
    let total = breakdown.total();
    match breakdown.unreliable {
        0 => None,
        n if n == total => Some(
            "All compared measurements are unreliable (<5s tracked); energy figures are dominated by tracker noise".to_string(),
        ),
        n => Some(format!(
            "{} of {} compared measurements ({:.0}%) are unreliable (<5s tracked); interpret energy differences with caution",
            n,
            total,
            breakdown.unreliable_fraction() * 100.0
        )),
    }
}
