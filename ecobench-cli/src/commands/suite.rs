// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench suite` command - Benchmark the full configuration matrix.

use std::path::Path;

use anyhow::Context;
use ecobench_benchmark::{build_matrix, narrow_registry, Orchestrator, RunOptions};

use super::{load_config, min_duration};
use crate::console;
use crate::report::subject_summaries;

pub async fn execute(
    config_path: Option<&Path>,
    results: Option<&Path>,
    runs: u32,
    subjects: &[String],
    loads: &[u32],
    endpoints: &[String],
    min_duration_secs: Option<f64>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path, results)?;
    config.registry = narrow_registry(&config.registry, subjects, loads, endpoints)?;
    let configs = build_matrix(&config.registry);
    let options = RunOptions {
        runs,
        min_duration: min_duration(min_duration_secs)?,
    };

    println!(
        "Suite: {} configuration(s) × {} run(s) = {} executions",
        configs.len(),
        runs,
        configs.len() * runs as usize
    );

    let orchestrator = Orchestrator::from_config(&config)
        .context("Failed to initialise the benchmark pipeline")?;
    let summary = orchestrator.run_batch(&configs, options).await?;

    console::print_batch(&summary);
    if !summary.records.is_empty() {
        println!();
        console::print_subject_summary(&subject_summaries(&summary.records));
    }
    Ok(())
}
