// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench startup` command - Measure container cold-start time.

use std::path::Path;

use anyhow::{bail, Context};
use ecobench_benchmark::{ContainerCli, StartupBenchmark};
use ecobench_core::ResultStore;

use super::load_config;
use crate::console;

pub async fn execute(
    config_path: Option<&Path>,
    results: Option<&Path>,
    subject: Option<&str>,
    repetitions: Option<u32>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path, results)?;
    if let Some(repetitions) = repetitions {
        if repetitions == 0 {
            bail!("--repetitions must be at least 1");
        }
        config.startup.repetitions = repetitions;
    }

    let subjects = match subject {
        Some(id) => vec![config.registry.subject(id)?.clone()],
        None => config.registry.subjects.clone(),
    };

    println!(
        "Cold start: {} subject(s) × {} repetition(s), timeout {:?}",
        subjects.len(),
        config.startup.repetitions,
        config.startup.timeout
    );

    let runtime = ContainerCli::new(&config.startup.container_binary);
    let bench = StartupBenchmark::new(runtime, &config)
        .context("Failed to initialise the health probe")?;
    let summaries = bench.run(&subjects).await;

    let store = ResultStore::create(&config.settings.results_dir)?;
    let path = store.save_startup(&summaries)?;

    console::print_startup(&summaries);
    println!();
    println!("Startup times saved to {}", path.display());
    Ok(())
}
