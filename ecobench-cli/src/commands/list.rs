// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ecobench list` command - Show the subject registry.

use std::path::Path;

use ecobench_benchmark::build_matrix;

use super::load_config;

pub async fn execute(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path, None)?;
    let registry = &config.registry;

    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                            CONFIGURED SUBJECTS                               ║");
    println!("╠═════════════════╦═══════════════════╦═══════════════════════════╦════════════╣");
    println!("║ ID              ║ Name              ║ Container                 ║ Port       ║");
    println!("╠═════════════════╬═══════════════════╬═══════════════════════════╬════════════╣");

    for subject in &registry.subjects {
        println!(
            "║ {:<15} ║ {:<17} ║ {:<25} ║ {:<10} ║",
            subject.id.as_str(),
            subject.name,
            subject.container,
            subject.port.value()
        );
    }

    println!("╚═════════════════╩═══════════════════╩═══════════════════════════╩════════════╝");
    println!();

    let loads: Vec<String> = registry.loads.iter().map(|l| l.to_string()).collect();
    println!("Loads:     {}", loads.join(", "));
    println!("Endpoints:");
    for endpoint in &registry.endpoints {
        println!("  - {:<8} {}", endpoint.name, endpoint.path);
    }
    println!();
    println!(
        "Total: {} subject(s), {} configuration(s)",
        registry.subjects.len(),
        build_matrix(registry).len()
    );

    Ok(())
}
