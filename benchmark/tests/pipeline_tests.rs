// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end pipeline tests against in-process HTTP responders.

use std::path::PathBuf;

use ecobench_benchmark::container::ContainerError;
use ecobench_benchmark::emissions::EmissionsError;
use ecobench_benchmark::monitor::MonitorError;
use ecobench_benchmark::{
    build_matrix, ContainerRuntime, EnergyTracker, Instrumentation, Orchestrator, Reading,
    ResourceQuery, RunOptions, StartupBenchmark,
};
use ecobench_core::{ConfigLoader, Reliability, ResultStore, Subject};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const RESPONSE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"status\":\"ok\"}";

/// Answer every request with 200 until the test runtime shuts down.
async fn spawn_responder() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(RESPONSE).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn yaml(results: &std::path::Path, alpha: u16, beta: u16) -> String {
    format!(
        r#"
settings:
  results_dir: {results}
  warmup_requests: 1
  warmup_pause_secs: 0
  inter_test_delay_secs: 0
  probe_timeout_secs: 2
  request_timeout_secs: 5
  concurrency_threshold: 10
  max_workers: 4
  monitor_interval_ms: 100
subjects:
  - id: alpha
    host: 127.0.0.1
    port: {alpha}
  - id: beta
    host: 127.0.0.1
    port: {beta}
loads: [20]
endpoints:
  - name: light
    path: /api/v1/weather/analytics/light
"#,
        results = results.display(),
    )
}

/// Writes a one-row telemetry table on stop.
struct TableTracker {
    dir: PathBuf,
    path: Option<PathBuf>,
}

impl EnergyTracker for TableTracker {
    async fn start(&mut self, test_id: &str) -> Result<(), EmissionsError> {
        self.path = Some(self.dir.join(format!("{test_id}.csv")));
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf, EmissionsError> {
        let path = self.path.take().ok_or(EmissionsError::NotStarted)?;
        std::fs::write(
            &path,
            "duration,emissions,energy_consumed,cpu_power,ram_power,tracking_mode\n\
             20.0,0.002,0.004,42.5,3.0,machine\n",
        )
        .unwrap();
        Ok(path)
    }
}

struct FixedQuery;

impl ResourceQuery for FixedQuery {
    async fn sample(&self) -> Result<Reading, MonitorError> {
        Ok(Reading {
            cpu_percent: 12.5,
            memory_mb: 64.0,
            memory_limit_mb: Some(1024.0),
        })
    }
}

struct FakeInstruments {
    dir: PathBuf,
}

impl Instrumentation for FakeInstruments {
    type Tracker = TableTracker;
    type Query = FixedQuery;

    fn tracker(&self, _subject: &Subject) -> TableTracker {
        TableTracker {
            dir: self.dir.clone(),
            path: None,
        }
    }

    fn resource_query(&self, _subject: &Subject) -> FixedQuery {
        FixedQuery
    }
}

#[tokio::test]
async fn test_repeated_batch_round_robin() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let alpha = spawn_responder().await;
    let beta = spawn_responder().await;
    let config = ConfigLoader::load_string(&yaml(&results, alpha, beta)).unwrap();

    let orchestrator = Orchestrator::new(
        config.registry.clone(),
        config.settings.clone(),
        FakeInstruments {
            dir: temp.path().to_path_buf(),
        },
    )
    .unwrap();
    let configs = build_matrix(orchestrator.registry());
    let summary = orchestrator
        .run_batch(
            &configs,
            RunOptions {
                runs: 2,
                min_duration: None,
            },
        )
        .await
        .unwrap();

    assert!(summary.skipped.is_empty());
    let order: Vec<(&str, Option<u32>)> = summary
        .records
        .iter()
        .map(|r| (r.subject.as_str(), r.run_index))
        .collect();
    assert_eq!(
        order,
        vec![
            ("alpha", Some(1)),
            ("beta", Some(1)),
            ("alpha", Some(2)),
            ("beta", Some(2)),
        ]
    );

    let record = &summary.records[0];
    assert_eq!(record.success_count, 20);
    assert_eq!(record.error_count, 0);
    assert_eq!(record.response_times_ms.len(), 20);
    assert!((record.emissions.emissions_kg - 0.002).abs() < 1e-12);
    assert!((record.avg_emissions_per_request_mg - 100.0).abs() < 1e-9);
    assert_eq!(record.emissions.reliability, Some(Reliability::Unreliable));
    assert_eq!(record.measurement_reliability, Some(Reliability::Unreliable));
    assert!(record.is_consistent());

    let batch = summary.batch_file.expect("batch file written");
    assert!(batch.exists());

    // Batch file must not double count.
    let loaded = ResultStore::new(&results).load_all().unwrap();
    assert_eq!(loaded.records.len(), 4);
    assert_eq!(loaded.reserved.len(), 1);
}

#[tokio::test]
async fn test_unhealthy_subject_is_skipped() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let alpha = spawn_responder().await;
    let config = ConfigLoader::load_string(&yaml(&results, alpha, closed_port())).unwrap();

    let orchestrator = Orchestrator::new(
        config.registry.clone(),
        config.settings.clone(),
        FakeInstruments {
            dir: temp.path().to_path_buf(),
        },
    )
    .unwrap();
    let configs = build_matrix(orchestrator.registry());
    let summary = orchestrator
        .run_batch(
            &configs,
            RunOptions {
                runs: 1,
                min_duration: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].subject.as_str(), "alpha");
    assert!(summary.records[0].run_index.is_none());
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].0.config.subject.as_str(), "beta");

    let loaded = ResultStore::new(&results).load_all().unwrap();
    assert_eq!(loaded.records.len(), 1);
}

#[tokio::test]
async fn test_min_duration_pads_tracked_window() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results");
    let alpha = spawn_responder().await;
    let beta = spawn_responder().await;
    let config = ConfigLoader::load_string(&yaml(&results, alpha, beta)).unwrap();

    let orchestrator = Orchestrator::new(
        config.registry.clone(),
        config.settings.clone(),
        FakeInstruments {
            dir: temp.path().to_path_buf(),
        },
    )
    .unwrap();
    let configs = build_matrix(orchestrator.registry());
    let summary = orchestrator
        .run_batch(
            &configs[..1],
            RunOptions {
                runs: 1,
                min_duration: Some(std::time::Duration::from_millis(600)),
            },
        )
        .await
        .unwrap();

    let record = &summary.records[0];
    assert!(record.padding_seconds > 0.0);
    let tracked = record.tracked_duration_seconds.unwrap();
    assert!(tracked >= 0.6 - 1e-6);
    assert!((tracked - record.test_duration_seconds - record.padding_seconds).abs() < 1e-9);
}

struct NoopRuntime;

impl ContainerRuntime for NoopRuntime {
    async fn stop(&self, _container: &str) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn start(&self, _container: &str) -> Result<(), ContainerError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_cold_start_measures_until_healthy() {
    let temp = TempDir::new().unwrap();
    let alpha = spawn_responder().await;
    let config = ConfigLoader::load_string(&yaml(temp.path(), alpha, closed_port())).unwrap();

    let bench = StartupBenchmark::new(NoopRuntime, &config).unwrap();
    let summary = bench.measure(&config.registry.subjects[0]).await;
    assert_eq!(summary.successful, 3);
    assert!(summary.mean_seconds.unwrap() >= 0.0);
    assert!(summary.measurements.iter().all(|m| m.error.is_none()));
}
