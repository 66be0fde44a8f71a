// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Omnibus and pairwise significance tests.
//!
//! The test statistics are computed here; tail probabilities come from the
//! caller so the same code serves every backend. Degenerate input never
//! errors, it produces a non-significant result carrying a diagnostic.

use std::fmt;

use serde::Serialize;

use super::descriptive::{mean, variance};
use super::metric::MetricSeries;
use super::ALPHA;
use crate::types::SubjectId;

/// Two-tailed p-value of a t statistic at the given degrees of freedom.
pub type TTail<'a> = &'a dyn Fn(f64, f64) -> Option<f64>;
/// Upper-tail p-value of an F statistic at (df_between, df_within).
pub type FTail<'a> = &'a dyn Fn(f64, f64, f64) -> Option<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Significance {
    Significant,
    NotSignificant,
    /// No inferential test was run.
    Untested,
}

impl Significance {
    fn from_p(p: f64) -> Self {
        if p < ALPHA {
            Self::Significant
        } else {
            Self::NotSignificant
        }
    }

    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Significant => "[SIG]",
            Self::NotSignificant => "[N.S.]",
            Self::Untested => "",
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(self, Self::Significant)
    }
}

/// Cohen's d magnitude bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EffectSize {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    pub fn classify(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            Self::Negligible
        } else if d < 0.5 {
            Self::Small
        } else if d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for EffectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WelchResult {
    pub t_stat: Option<f64>,
    pub df: Option<f64>,
    pub p_value: Option<f64>,
    pub significance: Significance,
    pub diagnostic: Option<String>,
}

impl WelchResult {
    fn degenerate(diagnostic: impl Into<String>) -> Self {
        Self {
            t_stat: None,
            df: None,
            p_value: None,
            significance: Significance::NotSignificant,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            significance: Significance::Untested,
            ..Self::degenerate(reason)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OmnibusResult {
    pub f_stat: Option<f64>,
    pub df_between: Option<f64>,
    pub df_within: Option<f64>,
    pub p_value: Option<f64>,
    /// Share of total variance explained by group membership.
    pub eta_squared: Option<f64>,
    pub significance: Significance,
    pub diagnostic: Option<String>,
}

impl OmnibusResult {
    fn degenerate(diagnostic: impl Into<String>) -> Self {
        Self {
            f_stat: None,
            df_between: None,
            df_within: None,
            p_value: None,
            eta_squared: None,
            significance: Significance::NotSignificant,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            significance: Significance::Untested,
            ..Self::degenerate(reason)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseResult {
    pub a: SubjectId,
    pub b: SubjectId,
    pub mean_a: f64,
    pub mean_b: f64,
    pub raw_p: Option<f64>,
    pub corrected_p: Option<f64>,
    pub cohens_d: f64,
    pub effect: EffectSize,
    pub significance: Significance,
    pub diagnostic: Option<String>,
}

/// Omnibus plus pairwise results for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalComparison {
    pub omnibus: OmnibusResult,
    pub pairwise: Vec<PairwiseResult>,
}

/// Bonferroni-adjusted p-value.
pub fn bonferroni(raw_p: f64, comparisons: usize) -> f64 {
    (raw_p * comparisons.max(1) as f64).min(1.0)
}

/// Cohen's d magnitude with the (n-1)-weighted pooled standard deviation.
/// Symmetric in its arguments; 0.0 when undefined.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    let (Some(var_a), Some(var_b)) = (variance(a), variance(b)) else {
        return 0.0;
    };
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0);
    if pooled <= 0.0 {
        return 0.0;
    }
    (mean(a) - mean(b)).abs() / pooled.sqrt()
}

/// Welch's unequal-variance t-test.
pub fn welch_t_test(a: &[f64], b: &[f64], t_tail: TTail<'_>) -> WelchResult {
    let (Some(var_a), Some(var_b)) = (variance(a), variance(b)) else {
        return WelchResult::degenerate(format!(
            "need at least 2 observations per group (got {} and {})",
            a.len(),
            b.len()
        ));
    };

    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let se_sq = var_a / n_a + var_b / n_b;
    if se_sq <= f64::EPSILON * f64::EPSILON {
        return WelchResult::degenerate("both groups have zero variance; t statistic undefined");
    }

    let t_stat = (mean(a) - mean(b)) / se_sq.sqrt();
    let denom =
        var_a.powi(2) / (n_a * n_a * (n_a - 1.0)) + var_b.powi(2) / (n_b * n_b * (n_b - 1.0));
    let df = se_sq.powi(2) / denom;

    match t_tail(t_stat, df).filter(|p| p.is_finite()) {
        Some(p) => WelchResult {
            t_stat: Some(t_stat),
            df: Some(df),
            p_value: Some(p),
            significance: Significance::from_p(p),
            diagnostic: None,
        },
        None => WelchResult {
            t_stat: Some(t_stat),
            df: Some(df),
            ..WelchResult::degenerate(format!("p-value undefined at df = {:.2}", df))
        },
    }
}

/// One-way ANOVA across every subject group in `series`.
pub fn one_way_anova(series: &MetricSeries, f_tail: FTail<'_>) -> OmnibusResult {
    if series.len() < 2 {
        return OmnibusResult::degenerate(format!(
            "need at least 2 groups (got {})",
            series.len()
        ));
    }
    if let Some((subject, values)) = series.iter().find(|(_, v)| v.len() < 2) {
        return OmnibusResult::degenerate(format!(
            "need at least 2 observations per group ({} has {})",
            subject,
            values.len()
        ));
    }

    let total: usize = series.iter().map(|(_, v)| v.len()).sum();
    let grand_mean = series.iter().flat_map(|(_, v)| v.iter()).sum::<f64>() / total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for (_, values) in series.iter() {
        let m = mean(values);
        ss_between += (m - grand_mean).powi(2) * values.len() as f64;
        ss_within += values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }

    let df_between = (series.len() - 1) as f64;
    let df_within = (total - series.len()) as f64;
    let f_stat = (ss_between / df_between) / (ss_within / df_within);
    let ss_total = ss_between + ss_within;
    let eta_squared = (ss_total > 0.0).then(|| ss_between / ss_total);

    if !f_stat.is_finite() {
        return OmnibusResult {
            df_between: Some(df_between),
            df_within: Some(df_within),
            eta_squared,
            ..OmnibusResult::degenerate(
                "F statistic undefined: every group has zero within-group variance",
            )
        };
    }

    match f_tail(f_stat, df_between, df_within).filter(|p| p.is_finite()) {
        Some(p) => OmnibusResult {
            f_stat: Some(f_stat),
            df_between: Some(df_between),
            df_within: Some(df_within),
            p_value: Some(p),
            eta_squared,
            significance: Significance::from_p(p),
            diagnostic: None,
        },
        None => OmnibusResult {
            f_stat: Some(f_stat),
            df_between: Some(df_between),
            df_within: Some(df_within),
            eta_squared,
            ..OmnibusResult::degenerate("p-value undefined for F distribution")
        },
    }
}

/// Welch's t-test over every unordered pair, Bonferroni-corrected.
pub fn pairwise_tests(series: &MetricSeries, t_tail: TTail<'_>) -> Vec<PairwiseResult> {
    let groups: Vec<_> = series.iter().collect();
    let pairs = groups.len() * groups.len().saturating_sub(1) / 2;

    let mut results = Vec::with_capacity(pairs);
    for (i, (subject_a, a)) in groups.iter().enumerate() {
        for (subject_b, b) in groups.iter().skip(i + 1) {
            let welch = welch_t_test(a, b, t_tail);
            let corrected_p = welch.p_value.map(|p| bonferroni(p, pairs));
            let significance = match corrected_p {
                Some(p) => Significance::from_p(p),
                None => welch.significance,
            };
            let d = cohens_d(a, b);
            results.push(PairwiseResult {
                a: (*subject_a).clone(),
                b: (*subject_b).clone(),
                mean_a: mean(a),
                mean_b: mean(b),
                raw_p: welch.p_value,
                corrected_p,
                cohens_d: d,
                effect: EffectSize::classify(d),
                significance,
                diagnostic: welch.diagnostic,
            });
        }
    }
    results
}
