// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench run` command - Benchmark a single configuration.

use std::path::Path;

use anyhow::Context;
use ecobench_benchmark::{build_matrix, narrow_registry, Orchestrator, RunOptions};

use super::{load_config, min_duration};
use crate::console;

pub async fn execute(
    config_path: Option<&Path>,
    results: Option<&Path>,
    subject: &str,
    load: u32,
    endpoint: &str,
    runs: u32,
    min_duration_secs: Option<f64>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, results)?;
    let registry = narrow_registry(
        &config.registry,
        &[subject.to_string()],
        &[load],
        &[endpoint.to_string()],
    )?;
    let configs = build_matrix(&registry);
    let options = RunOptions {
        runs,
        min_duration: min_duration(min_duration_secs)?,
    };

    tracing::info!(subject, load, endpoint, runs, "Running single configuration");

    let orchestrator = Orchestrator::from_config(&config)
        .context("Failed to initialise the benchmark pipeline")?;
    let summary = orchestrator.run_batch(&configs, options).await?;

    for record in &summary.records {
        console::print_run(record);
    }
    console::print_batch(&summary);
    Ok(())
}
