// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for the analysis side.
//!
//! Records are written through the result store, loaded back and fed to the
//! statistics engine, the same path the `analyze` command takes.

use chrono::Utc;
use ecobench_core::reliability::resolve;
use ecobench_core::stats::{detect_repetitions, slices, Significance};
use ecobench_core::{
    ConfigLoader, EmissionsReport, LatencyStats, Metric, Reliability, ResourceSummary,
    ResultStore, RunRecord, StatisticsEngine, SubjectId,
};
use tempfile::TempDir;
use uuid::Uuid;

fn run(subject: &str, run_index: u32, emissions_g: f64, tracked: f64) -> RunRecord {
    RunRecord {
        id: Uuid::new_v4(),
        subject: SubjectId::new(subject).unwrap(),
        subject_name: subject.to_string(),
        load_size: 100,
        endpoint_name: "light".to_string(),
        endpoint_path: "/api/v1/weather/analytics/light".to_string(),
        timestamp: Utc::now(),
        run_index: Some(run_index),
        duration_seconds: tracked,
        test_duration_seconds: tracked,
        tracked_duration_seconds: Some(tracked),
        padding_seconds: 0.0,
        success_count: 100,
        error_count: 0,
        success_rate: 100.0,
        requests_per_second: 100.0 / tracked,
        response_times_ms: vec![2.0; 100],
        response_time_stats: LatencyStats {
            min_ms: 2.0,
            max_ms: 2.0,
            mean_ms: 2.0,
            median_ms: 2.0,
            p95_ms: 2.0,
            p99_ms: 2.0,
        },
        emissions: EmissionsReport {
            emissions_kg: emissions_g / 1000.0,
            reliability: Some(Reliability::from_duration(tracked)),
            ..EmissionsReport::default()
        },
        avg_emissions_per_request_mg: emissions_g * 1000.0 / 100.0,
        resources: ResourceSummary::default(),
        measurement_reliability: Some(Reliability::from_duration(tracked)),
        host: None,
    }
}

#[test]
fn test_store_roundtrip_feeds_engine() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::create(dir.path()).unwrap();

    let mut all = Vec::new();
    for (i, (a, b)) in [(1.0, 5.0), (1.1, 5.2), (0.9, 4.8)].iter().enumerate() {
        let run_index = i as u32 + 1;
        all.push(run("gin", run_index, *a, 20.0));
        all.push(run("django", run_index, *b, 20.0));
    }
    for record in &all {
        store.save_run(record).unwrap();
    }
    store.save_batch(&all).unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.records.len(), 6);
    assert_eq!(detect_repetitions(&loaded.records), 3);

    let engine = StatisticsEngine::with_default_backend();
    let groups = slices(&loaded.records);
    assert_eq!(groups.len(), 1);
    let slice = groups.values().next().unwrap();
    let analysis = engine.analyze(Metric::EmissionsG, slice);

    let winner = analysis.winner.unwrap();
    assert_eq!(winner.winner.as_str(), "gin");
    if engine.backend().is_available() {
        assert_eq!(winner.significance, Significance::Significant);
    } else {
        assert_eq!(winner.significance, Significance::Untested);
    }
}

#[test]
fn test_short_runs_carry_caveat() {
    let records: Vec<RunRecord> = (1..=3)
        .flat_map(|i| [run("chi", i, 1.0 + i as f64 * 0.1, 3.0), run("gin", i, 2.0, 3.0)])
        .collect();
    let refs: Vec<&RunRecord> = records.iter().collect();
    let engine = StatisticsEngine::with_default_backend();
    let winner = engine.analyze(Metric::EmissionsG, &refs).winner.unwrap();
    assert!(winner.caveat.unwrap().starts_with("All compared"));
    assert!(records
        .iter()
        .all(|r| resolve(r).classification == Reliability::Unreliable));
}

#[test]
fn test_builtin_config_covers_matrix() {
    let config = ConfigLoader::builtin().unwrap();
    let registry = &config.registry;
    assert_eq!(
        registry.subjects.len() * registry.loads.len() * registry.endpoints.len(),
        54
    );
    assert!(config.tracker.is_enabled());
}
