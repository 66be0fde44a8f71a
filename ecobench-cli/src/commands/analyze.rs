// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench analyze` command - Summarise persisted results.
//!
//! Prints the console summary, writes the Markdown report and optionally
//! exports the per-slice statistical analysis as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use ecobench_core::stats::MetricAnalysis;
use ecobench_core::{ResultStore, StatisticsEngine};
use serde::Serialize;
use tracing::{info, warn};

use super::load_config;
use crate::console;
use crate::report::{self, analyze_slices, subject_summaries};

/// One (load, endpoint) slice in the JSON export.
#[derive(Debug, Serialize)]
struct SliceAnalysis<'a> {
    load: u32,
    endpoint: &'a str,
    analyses: &'a [MetricAnalysis],
}

pub async fn execute(
    config_path: Option<&Path>,
    results: Option<&Path>,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, results)?;
    let dir = &config.settings.results_dir;
    let loaded = ResultStore::new(dir).load_all()?;

    for (path, error) in &loaded.failed {
        println!("Warning: could not load {}: {}", path.display(), error);
    }
    if loaded.is_empty() {
        warn!(dir = %dir.display(), "No run records found");
        println!("No test results found in {}.", dir.display());
        println!("Run a benchmark first, e.g.: ecobench suite --runs 3");
        return Ok(());
    }

    let records = loaded.records;
    println!(
        "✓ Loaded {} run record(s) from {} file(s) ({} batch/startup file(s) skipped)",
        records.len(),
        loaded.files,
        loaded.reserved.len()
    );
    println!();

    let engine = StatisticsEngine::default();
    console::print_subject_summary(&subject_summaries(&records));
    console::print_load_scaling(&records);
    console::print_endpoint_breakdown(&records);

    let slices = if engine.inferential_ready(&records) {
        let slices = analyze_slices(&records, &engine);
        for ((load, endpoint), analyses) in &slices {
            console::print_winners(*load, endpoint, analyses);
        }
        slices
    } else {
        println!();
        println!(
            "⚠ Statistical comparison skipped: needs at least 2 runs per configuration and an available statistics backend ({})",
            engine.backend().name()
        );
        Vec::new()
    };

    let report_path = output.unwrap_or_else(|| dir.join("REPORT.md"));
    let content = report::render(&records, &engine, Utc::now())
        .context("Failed to render the report")?;
    std::fs::write(&report_path, content)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    info!(path = %report_path.display(), "Report written");
    println!();
    println!("📄 Markdown report saved to: {}", report_path.display());

    if let Some(json_path) = json {
        let export: Vec<SliceAnalysis<'_>> = slices
            .iter()
            .map(|((load, endpoint), analyses)| SliceAnalysis {
                load: *load,
                endpoint,
                analyses,
            })
            .collect();
        let file = File::create(&json_path)
            .with_context(|| format!("Failed to create {}", json_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &export)?;
        writer.flush()?;
        println!("Statistical analysis saved to: {}", json_path.display());
    }

    Ok(())
}
