// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cold-start benchmark.
//!
//! Stops a subject's container, starts it again and measures the wall clock
//! until the health endpoint first answers. Failed repetitions are recorded,
//! never fatal.

use std::time::Instant;

use chrono::Utc;
use ecobench_core::stats::descriptive::{mean, std_dev};
use ecobench_core::{Config, StartupConfig, StartupMeasurement, StartupSummary, Subject};
use tracing::{info, warn};

use crate::container::ContainerRuntime;
use crate::probe::{HealthProbe, ProbeError};

pub struct StartupBenchmark<R> {
    runtime: R,
    probe: HealthProbe,
    config: StartupConfig,
    health_path: String,
}

impl<R: ContainerRuntime> StartupBenchmark<R> {
    pub fn new(runtime: R, config: &Config) -> Result<Self, ProbeError> {
        Ok(Self {
            runtime,
            probe: HealthProbe::new(config.settings.probe_timeout)?,
            config: config.startup.clone(),
            health_path: config.settings.health_path.clone(),
        })
    }

    /// One stop/start cycle.
    pub async fn measure_once(&self, subject: &Subject, repetition: u32) -> StartupMeasurement {
        let failed = |error: String| {
            warn!(subject = %subject.id, repetition, error = %error, "Cold start failed");
            StartupMeasurement {
                repetition,
                seconds: None,
                error: Some(error),
            }
        };

        if let Err(e) = self.runtime.stop(&subject.container).await {
            return failed(e.to_string());
        }

        let start = Instant::now();
        if let Err(e) = self.runtime.start(&subject.container).await {
            return failed(e.to_string());
        }

        let url = subject.url(&self.health_path);
        match self
            .probe
            .wait_until_healthy(&url, self.config.timeout, self.config.poll_interval)
            .await
        {
            Ok(_) => {
                let seconds = start.elapsed().as_secs_f64();
                info!(subject = %subject.id, repetition, seconds, "Cold start measured");
                StartupMeasurement {
                    repetition,
                    seconds: Some(seconds),
                    error: None,
                }
            }
            Err(e) => failed(e.to_string()),
        }
    }

    /// All repetitions for one subject.
    pub async fn measure(&self, subject: &Subject) -> StartupSummary {
        let mut measurements = Vec::with_capacity(self.config.repetitions as usize);
        for repetition in 1..=self.config.repetitions {
            measurements.push(self.measure_once(subject, repetition).await);
        }
        summarize(subject, measurements)
    }

    /// Every subject in turn.
    pub async fn run(&self, subjects: &[Subject]) -> Vec<StartupSummary> {
        let mut summaries = Vec::with_capacity(subjects.len());
        for subject in subjects {
            info!(subject = %subject.id, repetitions = self.config.repetitions, "Measuring cold start");
            summaries.push(self.measure(subject).await);
        }
        summaries
    }
}

/// Aggregate repetitions into mean / std / min / max over the successes.
pub fn summarize(subject: &Subject, measurements: Vec<StartupMeasurement>) -> StartupSummary {
    let times: Vec<f64> = measurements.iter().filter_map(|m| m.seconds).collect();
    let (min, max) = if times.is_empty() {
        (None, None)
    } else {
        (
            Some(times.iter().copied().fold(f64::INFINITY, f64::min)),
            Some(times.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        )
    };

    StartupSummary {
        subject: subject.id.clone(),
        subject_name: subject.name.clone(),
        timestamp: Utc::now(),
        successful: times.len(),
        mean_seconds: (!times.is_empty()).then(|| mean(&times)),
        std_seconds: std_dev(&times),
        min_seconds: min,
        max_seconds: max,
        measurements,
    }
}
