// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench validate` command - Validate configuration file.

use std::path::Path;

use ecobench_core::ConfigLoader;

pub async fn execute(file: &Path) -> anyhow::Result<()> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let settings = &config.settings;
            println!("✓ Configuration is valid");
            println!();
            println!("Pipeline Settings:");
            println!("  Results Directory:     {}", settings.results_dir.display());
            println!("  Health Path:           {}", settings.health_path);
            println!("  Request Timeout:       {:?}", settings.request_timeout);
            println!(
                "  Concurrency:           {} workers above {} requests",
                settings.max_workers, settings.concurrency_threshold
            );
            println!(
                "  Warmup:                {} requests, {:?} pause",
                settings.warmup_requests, settings.warmup_pause
            );
            println!("  Inter-test Delay:      {:?}", settings.inter_test_delay);
            println!("  Monitor Interval:      {:?}", settings.monitor_interval);
            if let Some(min) = settings.min_duration {
                println!("  Minimum Duration:      {:?}", min);
            }
            println!();
            if config.tracker.is_enabled() {
                println!("Energy Tracker:          {}", config.tracker.command.join(" "));
            } else {
                println!("Energy Tracker:          disabled");
            }
            println!();
            println!("Subjects ({}):", config.registry.subjects.len());
            for subject in &config.registry.subjects {
                println!(
                    "  - {} ({}, {}, container: {})",
                    subject.id,
                    subject.name,
                    subject.base_url(),
                    subject.container
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
