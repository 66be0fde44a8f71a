// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Console tables.

use ecobench_benchmark::{format_latency_ms, BatchSummary};
use ecobench_core::reliability::resolve;
use ecobench_core::stats::MetricAnalysis;
use ecobench_core::{Metric, RunRecord, StartupSummary};

use crate::report::{best_by_average, endpoint_breakdown, load_scaling, SubjectSummary};

fn cell(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "N/A".to_string(),
    }
}

/// One finished run.
pub fn print_run(record: &RunRecord) {
    let mut label = format!(
        "{} / {} / {}",
        record.subject_name, record.load_size, record.endpoint_name
    );
    if let Some(n) = record.run_index {
        label.push_str(&format!(" (run {})", n));
    }
    let emissions = record
        .emissions
        .is_ok()
        .then(|| format!("{:.4} g CO2", record.emissions_g()))
        .unwrap_or_else(|| "N/A".to_string());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", label);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║ Requests:      {:<45} ║",
        format!(
            "{} ok / {} failed ({:.1}%)",
            record.success_count, record.error_count, record.success_rate
        )
    );
    println!(
        "║ Throughput:    {:<45} ║",
        format!("{:.2} req/s", record.requests_per_second)
    );
    println!(
        "║ Latency:       {:<45} ║",
        format!(
            "mean {}, p95 {}, p99 {}",
            format_latency_ms(record.response_time_stats.mean_ms),
            format_latency_ms(record.response_time_stats.p95_ms),
            format_latency_ms(record.response_time_stats.p99_ms)
        )
    );
    println!("║ Emissions:     {:<45} ║", emissions);
    println!(
        "║ CPU / Memory:  {:<45} ║",
        format!(
            "{} % / {} MB",
            cell(record.resources.cpu_percent.map(|a| a.avg), 1),
            cell(record.resources.memory_mb.map(|a| a.avg), 1)
        )
    );
    println!(
        "║ Reliability:   {:<45} ║",
        format!(
            "{} ({:.1}s tracked)",
            resolve(record).classification,
            record.tracked_duration_seconds.unwrap_or(record.test_duration_seconds)
        )
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
}

/// Batch outcome including skipped configurations.
pub fn print_batch(summary: &BatchSummary) {
    println!();
    println!(
        "Completed {} run(s), skipped {}.",
        summary.records.len(),
        summary.skipped.len()
    );
    for (run, reason) in &summary.skipped {
        println!("  ✗ {}: {}", run.config, reason);
    }
    if let Some(path) = &summary.batch_file {
        println!("Batch saved to {}", path.display());
    }
}

/// Per-subject averages and the plain-average leaders.
pub fn print_subject_summary(summaries: &[SubjectSummary]) {
    println!("╔═════════════════╦═════════╦═══════════════╦═══════════════╦════════════╦═══════════════╗");
    println!("║ Subject         ║ Records ║ Emissions (g) ║ Per Req (mg)  ║ Avg RPS    ║ Avg Time (ms) ║");
    println!("╠═════════════════╬═════════╬═══════════════╬═══════════════╬════════════╬═══════════════╣");
    for s in summaries {
        println!(
            "║ {:<15} ║ {:<7} ║ {:<13} ║ {:<13} ║ {:<10} ║ {:<13} ║",
            s.name,
            s.records,
            cell(s.emissions_g, 3),
            cell(s.emissions_per_request_mg, 3),
            cell(s.requests_per_second, 2),
            cell(s.mean_response_ms, 2)
        );
    }
    println!("╚═════════════════╩═════════╩═══════════════╩═══════════════╩════════════╩═══════════════╝");

    println!();
    println!("Leaders (plain averages, all loads and endpoints):");
    for (label, metric, unit) in [
        ("Lowest total emissions", Metric::EmissionsG, "g CO2"),
        ("Lowest per-request", Metric::EmissionsPerRequestMg, "mg CO2"),
        ("Highest throughput", Metric::RequestsPerSecond, "req/s"),
        ("Fastest response time", Metric::MeanResponseMs, "ms"),
    ] {
        if let Some((s, v)) = best_by_average(summaries, metric) {
            println!("  {:<24} {} ({:.3} {})", label, s.name, v, unit);
        }
    }
}

/// How each subject's averages move with load size.
pub fn print_load_scaling(records: &[RunRecord]) {
    println!();
    println!("Load scaling:");
    for (subject, rows) in load_scaling(records) {
        println!();
        println!("  {}:", subject.name);
        println!(
            "    {:<10} {:<15} {:<15} {:<12} {:<15}",
            "Load", "Emissions (g)", "Per Req (mg)", "RPS", "Avg Time (ms)"
        );
        println!("    {}", "-".repeat(65));
        for (load, s) in rows {
            println!(
                "    {:<10} {:<15} {:<15} {:<12} {:<15}",
                load,
                cell(s.emissions_g, 3),
                cell(s.emissions_per_request_mg, 3),
                cell(s.requests_per_second, 2),
                cell(s.mean_response_ms, 2)
            );
        }
    }
}

/// Subject averages per endpoint, pooled over loads.
pub fn print_endpoint_breakdown(records: &[RunRecord]) {
    println!();
    println!("By endpoint:");
    for (endpoint, summaries) in endpoint_breakdown(records) {
        println!();
        println!("  {}:", endpoint);
        println!(
            "    {:<15} {:<8} {:<15} {:<12} {:<10}",
            "Subject", "Records", "Emissions (g)", "Per Req (mg)", "RPS"
        );
        println!("    {}", "-".repeat(60));
        for s in summaries {
            println!(
                "    {:<15} {:<8} {:<15} {:<12} {:<10}",
                s.name,
                s.records,
                cell(s.emissions_g, 3),
                cell(s.emissions_per_request_mg, 3),
                cell(s.requests_per_second, 2)
            );
        }
    }
}

/// Significance-qualified winners for one slice.
pub fn print_winners(load: u32, endpoint: &str, analyses: &[MetricAnalysis]) {
    println!();
    println!("{} requests, {} endpoint:", load, endpoint);
    for analysis in analyses {
        if let Some(winner) = &analysis.winner {
            println!("  {}", winner.statement);
            if let Some(caveat) = &winner.caveat {
                println!("    ! {}", caveat);
            }
        }
    }
}

/// Cold-start results per subject.
pub fn print_startup(summaries: &[StartupSummary]) {
    println!("╔═════════════════╦═══════════╦════════════╦════════════╦════════════╦════════════╗");
    println!("║ Subject         ║ Succeeded ║ Mean (s)   ║ Std (s)    ║ Min (s)    ║ Max (s)    ║");
    println!("╠═════════════════╬═══════════╬════════════╬════════════╬════════════╬════════════╣");
    for s in summaries {
        println!(
            "║ {:<15} ║ {:<9} ║ {:<10} ║ {:<10} ║ {:<10} ║ {:<10} ║",
            s.subject_name,
            format!("{}/{}", s.successful, s.measurements.len()),
            cell(s.mean_seconds, 3),
            cell(s.std_seconds, 3),
            cell(s.min_seconds, 3),
            cell(s.max_seconds, 3)
        );
    }
    println!("╚═════════════════╩═══════════╩════════════╩════════════╩════════════╩════════════╝");

    for s in summaries {
        for m in &s.measurements {
            if let Some(error) = &m.error {
                println!("  ✗ {} repetition {}: {}", s.subject_name, m.repetition, error);
            }
        }
    }
}
