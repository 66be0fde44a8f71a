// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Descriptive statistics with confidence intervals.

use serde::Serialize;

use super::backend::StatsBackend;

/// Arithmetic mean. 0.0 for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator). `None` below two observations.
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(sum_sq / (values.len() - 1) as f64)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Two-sided 95% interval around a mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub critical_value: f64,
    /// The critical value is the fixed fallback, not a t quantile.
    pub approximate: bool,
}

impl ConfidenceInterval {
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub n: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: Option<f64>,
    pub std_error: Option<f64>,
    /// Undefined below two observations.
    pub ci95: Option<ConfidenceInterval>,
}

impl DescriptiveStats {
    /// `None` for an empty sample.
    pub fn compute(values: &[f64], backend: &dyn StatsBackend) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = std_dev(values);
        Some(Self {
            n: values.len(),
            mean: mean(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev,
            std_error: std_dev.map(|s| s / (values.len() as f64).sqrt()),
            ci95: backend.compute_confidence_interval(values),
        })
    }
}
