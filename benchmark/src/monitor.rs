// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Background resource monitor.
//!
//! Samples the CPU and memory of the service container on a fixed cadence
//! between `start` and `stop`, independent of load progress. Query failures
//! are recorded on the summary and never abort the run.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ecobench_core::{ResourceSample, ResourceSummary};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const DOCKER_STATS_FORMAT: &str = "{{.CPUPerc}}|{{.MemUsage}}";
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource query exited with {status}: {stderr}")]
    QueryFailed { status: String, stderr: String },

    #[error("Resource query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },
}

/// One point-in-time reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub memory_limit_mb: Option<f64>,
}

/// Source of point-in-time readings.
pub trait ResourceQuery: Send + Sync + 'static {
    fn sample(&self) -> impl Future<Output = Result<Reading, MonitorError>> + Send;
}

/// `docker stats --no-stream` against one container.
#[derive(Debug, Clone)]
pub struct DockerStatsQuery {
    binary: String,
    container: String,
}

impl DockerStatsQuery {
    pub fn new(binary: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            container: container.into(),
        }
    }
}

impl ResourceQuery for DockerStatsQuery {
    async fn sample(&self) -> Result<Reading, MonitorError> {
        let output = Command::new(&self.binary)
            .args(["stats", "--no-stream", "--format", DOCKER_STATS_FORMAT])
            .arg(&self.container)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(QUERY_TIMEOUT, output)
            .await
            .map_err(|_| MonitorError::Timeout(QUERY_TIMEOUT))?
            .map_err(|source| MonitorError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MonitorError::QueryFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_stats_line(String::from_utf8_lossy(&output.stdout).trim())
    }
}

/// Parse `"<cpu>%|<used> / <total>"`.
pub fn parse_stats_line(line: &str) -> Result<Reading, MonitorError> {
    let (cpu, mem) = line.split_once('|').ok_or_else(|| MonitorError::Parse {
        input: line.to_string(),
        reason: "expected '<cpu>|<memory>'".to_string(),
    })?;
    let (used, limit) = parse_usage(mem)?;
    Ok(Reading {
        cpu_percent: parse_percent(cpu)?,
        memory_mb: used,
        memory_limit_mb: limit,
    })
}

/// Parse a percentage such as `"12.5%"`.
pub fn parse_percent(input: &str) -> Result<f64, MonitorError> {
    let trimmed = input.trim();
    trimmed
        .strip_suffix('%')
        .unwrap_or(trimmed)
        .trim()
        .parse::<f64>()
        .map_err(|e| MonitorError::Parse {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Parse `"used / total"`; the total is optional.
pub fn parse_usage(input: &str) -> Result<(f64, Option<f64>), MonitorError> {
    match input.split_once('/') {
        Some((used, total)) => Ok((parse_size_mb(used)?, Some(parse_size_mb(total)?))),
        None => Ok((parse_size_mb(input)?, None)),
    }
}

/// Parse a size with unit suffix into megabytes (10^6 bytes).
///
/// Binary units (`B`, `KiB`, `MiB`, `GiB`, `TiB`) and decimal units
/// (`kB`, `MB`, `GB`, `TB`) are both accepted.
pub fn parse_size_mb(input: &str) -> Result<f64, MonitorError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let parse_err = |reason: String| MonitorError::Parse {
        input: input.to_string(),
        reason,
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| parse_err(e.to_string()))?;

    let bytes_per_unit = match unit.trim() {
        "" | "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        other => return Err(parse_err(format!("unknown unit '{}'", other))),
    };

    Ok(value * bytes_per_unit / 1e6)
}

#[derive(Debug, Default)]
struct MonitorState {
    samples: Vec<ResourceSample>,
    error: Option<String>,
}

/// A running monitor. Dropping it without `stop` aborts the task.
pub struct ResourceMonitor {
    state: Arc<Mutex<MonitorState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl ResourceMonitor {
    /// Start sampling `query` every `interval`.
    pub fn start<Q: ResourceQuery>(query: Q, interval: Duration, stop_timeout: Duration) -> Self {
        let state = Arc::new(Mutex::new(MonitorState::default()));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let state_for_task = Arc::clone(&state);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let result = tokio::select! {
                            biased;
                            _ = &mut stop_rx => break,
                            result = query.sample() => result,
                        };
                        let mut state = state_for_task.lock().unwrap_or_else(|e| e.into_inner());
                        match result {
                            Ok(reading) => state.samples.push(ResourceSample {
                                elapsed_secs: started.elapsed().as_secs_f64(),
                                cpu_percent: reading.cpu_percent,
                                memory_mb: reading.memory_mb,
                                memory_limit_mb: reading.memory_limit_mb,
                            }),
                            Err(e) => {
                                if state.error.is_none() {
                                    warn!(error = %e, "Resource query failed; continuing without samples");
                                    state.error = Some(e.to_string());
                                } else {
                                    debug!(error = %e, "Resource query failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        Self {
            state,
            stop_tx: Some(stop_tx),
            task: Some(task),
            stop_timeout,
        }
    }

    /// Stop sampling and summarise. Waits for the task to quiesce, aborting
    /// it if it does not finish within the stop timeout.
    pub async fn stop(mut self) -> ResourceSummary {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(self.stop_timeout, &mut task)
                .await
                .is_err()
            {
                warn!(timeout = ?self.stop_timeout, "Resource monitor did not stop in time; aborting");
                task.abort();
            }
        }

        let state = std::mem::take(&mut *self.state.lock().unwrap_or_else(|e| e.into_inner()));
        debug!(samples = state.samples.len(), "Resource monitor stopped");
        ResourceSummary::from_samples(state.samples, state.error)
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedQuery {
        calls: Arc<AtomicU32>,
    }

    impl ResourceQuery for FixedQuery {
        async fn sample(&self) -> Result<Reading, MonitorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            Ok(Reading {
                cpu_percent: 10.0 + n,
                memory_mb: 100.0 + n,
                memory_limit_mb: Some(2048.0),
            })
        }
    }

    struct FailingQuery;

    impl ResourceQuery for FailingQuery {
        async fn sample(&self) -> Result<Reading, MonitorError> {
            Err(MonitorError::QueryFailed {
                status: "exit status: 1".to_string(),
                stderr: "No such container".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("12.5%").unwrap(), 12.5);
        assert_eq!(parse_percent(" 0.00% ").unwrap(), 0.0);
        assert!(parse_percent("--").is_err());
    }

    #[test]
    fn test_parse_sizes() {
        assert!((parse_size_mb("1MiB").unwrap() - 1.048576).abs() < 1e-9);
        assert!((parse_size_mb("1.5GiB").unwrap() - 1610.612736).abs() < 1e-6);
        assert!((parse_size_mb("512KiB").unwrap() - 0.524288).abs() < 1e-9);
        assert!((parse_size_mb("250MB").unwrap() - 250.0).abs() < 1e-9);
        assert!((parse_size_mb("2GB").unwrap() - 2000.0).abs() < 1e-9);
        assert!((parse_size_mb("500kB").unwrap() - 0.5).abs() < 1e-9);
        assert!((parse_size_mb("2000000B").unwrap() - 2.0).abs() < 1e-9);
        assert!(parse_size_mb("12XB").is_err());
    }

    #[test]
    fn test_parse_stats_line() {
        let reading = parse_stats_line("3.25%|100MB / 2GB").unwrap();
        assert_eq!(reading.cpu_percent, 3.25);
        assert!((reading.memory_mb - 100.0).abs() < 1e-9);
        assert!((reading.memory_limit_mb.unwrap() - 2000.0).abs() < 1e-9);
        assert!(parse_stats_line("garbage").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_collects_until_stopped() {
        let calls = Arc::new(AtomicU32::new(0));
        let monitor = ResourceMonitor::start(
            FixedQuery {
                calls: Arc::clone(&calls),
            },
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        tokio::time::sleep(Duration::from_millis(450)).await;
        let summary = monitor.stop().await;

        assert!(summary.sample_count >= 4);
        assert!(summary.error.is_none());
        let memory = summary.memory_mb.unwrap();
        assert_eq!(memory.baseline, 100.0);
        assert_eq!(summary.cpu_percent.unwrap().min, 10.0);

        // Quiesced: no samples after stop.
        let after = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_query_records_error() {
        let monitor =
            ResourceMonitor::start(FailingQuery, Duration::from_millis(100), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(250)).await;
        let summary = monitor.stop().await;

        assert_eq!(summary.sample_count, 0);
        assert!(summary.cpu_percent.is_none());
        assert!(summary.error.unwrap().contains("No such container"));
    }
}
