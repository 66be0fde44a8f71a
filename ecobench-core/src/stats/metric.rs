// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Metric projections over run records.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RunRecord;
use crate::types::SubjectId;

/// Which end of a metric is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

impl Direction {
    /// Whether `candidate` beats `incumbent`.
    pub fn prefers(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::LowerIsBetter => candidate < incumbent,
            Self::HigherIsBetter => candidate > incumbent,
        }
    }

    pub const fn superlative(&self) -> &'static str {
        match self {
            Self::LowerIsBetter => "lowest",
            Self::HigherIsBetter => "highest",
        }
    }
}

/// A scalar projection of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    EmissionsG,
    EmissionsPerRequestMg,
    EnergyKwh,
    RequestsPerSecond,
    MeanResponseMs,
    P95ResponseMs,
    CpuAvgPercent,
    MemoryAvgMb,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::EmissionsG,
        Metric::EmissionsPerRequestMg,
        Metric::EnergyKwh,
        Metric::RequestsPerSecond,
        Metric::MeanResponseMs,
        Metric::P95ResponseMs,
        Metric::CpuAvgPercent,
        Metric::MemoryAvgMb,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            Self::EmissionsG => "Emissions (g CO2)",
            Self::EmissionsPerRequestMg => "Emissions per request (mg CO2)",
            Self::EnergyKwh => "Energy (kWh)",
            Self::RequestsPerSecond => "Throughput (req/s)",
            Self::MeanResponseMs => "Mean response time (ms)",
            Self::P95ResponseMs => "P95 response time (ms)",
            Self::CpuAvgPercent => "Average CPU (%)",
            Self::MemoryAvgMb => "Average memory (MB)",
        }
    }

    pub const fn direction(&self) -> Direction {
        match self {
            Self::RequestsPerSecond => Direction::HigherIsBetter,
            _ => Direction::LowerIsBetter,
        }
    }

    /// Whether the metric comes from the energy tracker.
    pub const fn is_energy(&self) -> bool {
        matches!(
            self,
            Self::EmissionsG | Self::EmissionsPerRequestMg | Self::EnergyKwh
        )
    }

    /// Project a record onto this metric. `None` when the record has no
    /// meaningful value (adapter error, no successes, no samples).
    pub fn extract(&self, record: &RunRecord) -> Option<f64> {
        let value = match self {
            Self::EmissionsG => record.emissions.is_ok().then(|| record.emissions_g())?,
            Self::EmissionsPerRequestMg => record
                .emissions
                .is_ok()
                .then_some(record.avg_emissions_per_request_mg)?,
            Self::EnergyKwh => record
                .emissions
                .is_ok()
                .then_some(record.emissions.energy_consumed_kwh)?,
            Self::RequestsPerSecond => record.requests_per_second,
            Self::MeanResponseMs => (record.success_count > 0)
                .then_some(record.response_time_stats.mean_ms)?,
            Self::P95ResponseMs => (record.success_count > 0)
                .then_some(record.response_time_stats.p95_ms)?,
            Self::CpuAvgPercent => record.resources.cpu_percent?.avg,
            Self::MemoryAvgMb => record.resources.memory_mb?.avg,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-subject values of one metric, in record order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    metric: Metric,
    groups: BTreeMap<SubjectId, Vec<f64>>,
}

impl MetricSeries {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            groups: BTreeMap::new(),
        }
    }

    /// Group the projected values of `records` by subject. Records without a
    /// value for the metric are left out.
    pub fn from_records<'a>(
        metric: Metric,
        records: impl IntoIterator<Item = &'a RunRecord>,
    ) -> Self {
        let mut series = Self::new(metric);
        for record in records {
            if let Some(value) = metric.extract(record) {
                series.push(record.subject.clone(), value);
            }
        }
        series
    }

    pub fn push(&mut self, subject: SubjectId, value: f64) {
        self.groups.entry(subject).or_default().push(value);
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn get(&self, subject: &SubjectId) -> Option<&[f64]> {
        self.groups.get(subject).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectId, &[f64])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of subject groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Records sharing a load size and endpoint, so subjects are compared like
/// for like.
pub type Slice<'a> = BTreeMap<(u32, String), Vec<&'a RunRecord>>;

pub fn slices(records: &[RunRecord]) -> Slice<'_> {
    let mut out: Slice<'_> = BTreeMap::new();
    for record in records {
        out.entry((record.load_size, record.endpoint_name.clone()))
            .or_default()
            .push(record);
    }
    out
}

/// Number of independent runs per configuration present in `records`.
///
/// Uses the highest explicit run index when any record carries one,
/// otherwise the largest number of records sharing a configuration.
pub fn detect_repetitions(records: &[RunRecord]) -> u32 {
    if let Some(max_index) = records.iter().filter_map(|r| r.run_index).max() {
        return max_index.max(1);
    }

    let mut counts: HashMap<_, u32> = HashMap::new();
    for config in records.iter().filter_map(RunRecord::configuration) {
        *counts.entry(config).or_default() += 1;
    }
    counts.into_values().max().unwrap_or(1)
}
