// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Persisted run records.
//!
//! A [`RunRecord`] is written exactly once per execution of a
//! [`BenchmarkConfiguration`] and never mutated afterwards. Every field that
//! did not exist in earlier record layouts carries a serde default so old
//! result directories stay loadable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reliability::Reliability;
use crate::types::{LoadSize, SubjectId};

/// A (subject, load size, endpoint) tuple under test. Identity key for grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BenchmarkConfiguration {
    pub subject: SubjectId,
    pub load_size: LoadSize,
    pub endpoint: String,
}

impl BenchmarkConfiguration {
    pub fn new(subject: SubjectId, load_size: LoadSize, endpoint: impl Into<String>) -> Self {
        Self {
            subject,
            load_size,
            endpoint: endpoint.into(),
        }
    }

    /// Short label used for file names and tracker project names.
    pub fn test_id(&self) -> String {
        format!("{}_{}_{}", self.subject, self.endpoint, self.load_size)
    }
}

impl fmt::Display for BenchmarkConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} requests / {}",
            self.subject, self.load_size, self.endpoint
        )
    }
}

/// Response-time distribution of the successful requests, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// How the energy tracker obtained CPU power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMeasurement {
    /// Every sample reported the same CPU power: a TDP-based estimate.
    Constant,
    /// CPU power varied between samples: read from hardware counters.
    Variable,
    #[default]
    Unknown,
}

impl PowerMeasurement {
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Constant => "constant (TDP-estimated)",
            Self::Variable => "variable (hardware-measured)",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PowerMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Energy telemetry extracted from the tracker's exported table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionsReport {
    pub emissions_kg: f64,
    pub energy_consumed_kwh: f64,
    pub cpu_power_w: f64,
    pub gpu_power_w: f64,
    pub ram_power_w: f64,
    pub cpu_energy_kwh: f64,
    pub gpu_energy_kwh: f64,
    pub ram_energy_kwh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_total_size_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_duration_secs: Option<f64>,
    /// Number of telemetry rows the tracker exported.
    pub sample_rows: usize,
    pub power_measurement: PowerMeasurement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability: Option<Reliability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmissionsReport {
    /// An adapter-level failure: no telemetry, reliability unknown.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            reliability: Some(Reliability::Unknown),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn emissions_g(&self) -> f64 {
        self.emissions_kg * 1000.0
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// min / avg / max of one sampled quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl Aggregate {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, avg, max })
    }
}

/// Memory aggregate plus the first sample, taken as the idle baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryAggregate {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub baseline: f64,
}

impl MemoryAggregate {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let baseline = *values.first()?;
        Aggregate::from_values(values).map(|agg| Self {
            min: agg.min,
            avg: agg.avg,
            max: agg.max,
            baseline,
        })
    }
}

/// One point-in-time reading of the service container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Seconds since the monitor started.
    pub elapsed_secs: f64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<f64>,
}

/// Output of the resource monitor for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSummary {
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<MemoryAggregate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<ResourceSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceSummary {
    pub fn from_samples(samples: Vec<ResourceSample>, error: Option<String>) -> Self {
        let cpu: Vec<f64> = samples.iter().map(|s| s.cpu_percent).collect();
        let mem: Vec<f64> = samples.iter().map(|s| s.memory_mb).collect();
        Self {
            sample_count: samples.len(),
            cpu_percent: Aggregate::from_values(&cpu),
            memory_mb: MemoryAggregate::from_values(&mem),
            samples,
            error,
        }
    }
}

/// Host the benchmark ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub os: String,
    pub os_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_bytes: u64,
    pub hostname: String,
}

/// One independent execution of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub subject: SubjectId,
    pub subject_name: String,
    pub load_size: u32,
    pub endpoint_name: String,
    #[serde(default)]
    pub endpoint_path: String,
    pub timestamp: DateTime<Utc>,
    /// Present iff the configuration was executed more than once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_index: Option<u32>,
    /// Wall clock from tracker start to tracker stop.
    pub duration_seconds: f64,
    /// Wall clock of the load phase alone.
    pub test_duration_seconds: f64,
    /// Load phase plus any padding inserted for the tracker's sampling window.
    #[serde(default)]
    pub tracked_duration_seconds: Option<f64>,
    #[serde(default)]
    pub padding_seconds: f64,
    pub success_count: u32,
    pub error_count: u32,
    pub success_rate: f64,
    pub requests_per_second: f64,
    /// Sorted ascending; one entry per successful request.
    #[serde(default)]
    pub response_times_ms: Vec<f64>,
    pub response_time_stats: LatencyStats,
    #[serde(default)]
    pub emissions: EmissionsReport,
    #[serde(default)]
    pub avg_emissions_per_request_mg: f64,
    #[serde(default)]
    pub resources: ResourceSummary,
    /// Explicit classification; wins over every other source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_reliability: Option<Reliability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostInfo>,
}

impl RunRecord {
    /// Configuration this record belongs to, if its fields still validate.
    pub fn configuration(&self) -> Option<BenchmarkConfiguration> {
        let load = LoadSize::new(self.load_size).ok()?;
        Some(BenchmarkConfiguration::new(
            self.subject.clone(),
            load,
            self.endpoint_name.clone(),
        ))
    }

    pub fn emissions_g(&self) -> f64 {
        self.emissions.emissions_g()
    }

    /// `success + error == load` and one latency sample per success.
    pub fn is_consistent(&self) -> bool {
        self.success_count + self.error_count == self.load_size
            && self.response_times_ms.len() == self.success_count as usize
    }
}

/// One cold-start repetition: seconds until the first healthy probe, or why
/// the service never became healthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupMeasurement {
    pub repetition: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cold-start results for one subject across repetitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupSummary {
    pub subject: SubjectId,
    pub subject_name: String,
    pub timestamp: DateTime<Utc>,
    pub measurements: Vec<StartupMeasurement>,
    pub successful: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_seconds: Option<f64>,
    /// Sample standard deviation; absent below two successes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seconds: Option<f64>,
}
