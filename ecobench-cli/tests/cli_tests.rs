// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Command-line tests against the built `ecobench` binary.

use std::path::Path;
use std::process::{Command, Output};

use chrono::Utc;
use ecobench_core::{
    EmissionsReport, LatencyStats, ResourceSummary, ResultStore, RunRecord, SubjectId,
};
use tempfile::TempDir;
use uuid::Uuid;

fn ecobench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecobench"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run ecobench")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn record(subject: &str, run: u32, emissions_kg: f64) -> RunRecord {
    RunRecord {
        id: Uuid::new_v4(),
        subject: SubjectId::new(subject).unwrap(),
        subject_name: subject.to_string(),
        load_size: 100,
        endpoint_name: "light".to_string(),
        endpoint_path: "/api/v1/weather/analytics/light".to_string(),
        timestamp: Utc::now(),
        run_index: Some(run),
        duration_seconds: 20.0,
        test_duration_seconds: 20.0,
        tracked_duration_seconds: Some(20.0),
        padding_seconds: 0.0,
        success_count: 100,
        error_count: 0,
        success_rate: 100.0,
        requests_per_second: 400.0 + run as f64,
        response_times_ms: vec![2.5; 100],
        response_time_stats: LatencyStats {
            min_ms: 2.5,
            max_ms: 2.5,
            mean_ms: 2.5,
            median_ms: 2.5,
            p95_ms: 2.5,
            p99_ms: 2.5,
        },
        emissions: EmissionsReport {
            emissions_kg,
            ..EmissionsReport::default()
        },
        avg_emissions_per_request_mg: emissions_kg * 1e6 / 100.0,
        resources: ResourceSummary::default(),
        measurement_reliability: None,
        host: None,
    }
}

fn seed(dir: &Path) {
    let store = ResultStore::create(dir).unwrap();
    let mut all = Vec::new();
    for run in 1..=2 {
        for (subject, kg) in [("gin", 0.001), ("django", 0.003)] {
            let r = record(subject, run, kg + run as f64 * 1e-4);
            store.save_run(&r).unwrap();
            all.push(r);
        }
    }
    store.save_batch(&all).unwrap();
}

#[test]
fn test_analyze_without_records_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("empty");
    let output = ecobench(&["analyze", "--results", results.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No test results found"));
}

#[test]
fn test_analyze_writes_report() {
    let temp = TempDir::new().unwrap();
    seed(temp.path());
    let report = temp.path().join("REPORT.md");
    let json = temp.path().join("analysis.json");

    let output = ecobench(&[
        "analyze",
        "--results",
        temp.path().to_str().unwrap(),
        "--output",
        report.to_str().unwrap(),
        "--json",
        json.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);
    let text = stdout(&output);
    assert!(text.contains("Loaded 4 run record(s)"));
    assert!(text.contains("Load scaling:"));
    assert!(text.contains("By endpoint:"));

    let content = std::fs::read_to_string(&report).unwrap();
    assert!(content.contains("## Subject Summary"));
    assert!(content.contains("## Methodology"));
    assert!(content.contains("Runs per configuration: 2"));

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert!(exported.is_array());
}

#[test]
fn test_list_shows_builtin_registry() {
    let output = ecobench(&["list"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("gin-carbon-test"));
    assert!(text.contains("54 configuration(s)"));
}

#[test]
fn test_validate_rejects_duplicate_ports() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    std::fs::write(
        &path,
        "subjects:\n  - id: a\n    port: 8000\n  - id: b\n    port: 8000\n",
    )
    .unwrap();

    let output = ecobench(&["validate", path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_run_rejects_unknown_subject() {
    let output = ecobench(&["run", "nosuchservice"]);
    assert!(!output.status.success());
}
