// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Markdown comparison report.
//!
//! Sections, in order: subject summary, measurement reliability, statistical
//! analysis (only with repeated runs and a statistics backend), detailed
//! results, key findings, methodology.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use ecobench_core::reliability::{resolve, MARGINAL_MIN_SECS, RELIABLE_MIN_SECS};
use ecobench_core::stats::descriptive::mean;
use ecobench_core::stats::{detect_repetitions, slices, MetricAnalysis, ALPHA};
use ecobench_core::{Metric, ReliabilityBreakdown, RunRecord, StatisticsEngine, SubjectId};

/// Metrics compared in the statistical section.
pub const COMPARED_METRICS: [Metric; 5] = [
    Metric::EmissionsG,
    Metric::EmissionsPerRequestMg,
    Metric::RequestsPerSecond,
    Metric::MeanResponseMs,
    Metric::P95ResponseMs,
];

/// Per-subject averages over every loaded record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub subject: SubjectId,
    pub name: String,
    pub records: usize,
    pub emissions_g: Option<f64>,
    pub emissions_per_request_mg: Option<f64>,
    pub requests_per_second: Option<f64>,
    pub mean_response_ms: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<f64>,
}

impl SubjectSummary {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::EmissionsG => self.emissions_g,
            Metric::EmissionsPerRequestMg => self.emissions_per_request_mg,
            Metric::RequestsPerSecond => self.requests_per_second,
            Metric::MeanResponseMs => self.mean_response_ms,
            Metric::CpuAvgPercent => self.cpu_percent,
            Metric::MemoryAvgMb => self.memory_mb,
            _ => None,
        }
    }
}

fn average(metric: Metric, records: &[&RunRecord]) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| metric.extract(r)).collect();
    (!values.is_empty()).then(|| mean(&values))
}

/// Summaries ordered by subject id.
pub fn subject_summaries(records: &[RunRecord]) -> Vec<SubjectSummary> {
    let refs: Vec<&RunRecord> = records.iter().collect();
    summarize(&refs)
}

/// Per subject, averages at each load size in ascending order.
pub fn load_scaling(records: &[RunRecord]) -> Vec<(SubjectSummary, Vec<(u32, SubjectSummary)>)> {
    let refs: Vec<&RunRecord> = records.iter().collect();
    summarize(&refs)
        .into_iter()
        .map(|overall| {
            let mut by_load: BTreeMap<u32, Vec<&RunRecord>> = BTreeMap::new();
            for record in records.iter().filter(|r| r.subject == overall.subject) {
                by_load.entry(record.load_size).or_default().push(record);
            }
            let rows = by_load
                .into_iter()
                .filter_map(|(load, items)| summarize(&items).pop().map(|s| (load, s)))
                .collect();
            (overall, rows)
        })
        .collect()
}

/// Per endpoint name, subject averages over every load.
pub fn endpoint_breakdown(records: &[RunRecord]) -> Vec<(String, Vec<SubjectSummary>)> {
    let mut by_endpoint: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for record in records {
        by_endpoint
            .entry(record.endpoint_name.as_str())
            .or_default()
            .push(record);
    }
    by_endpoint
        .into_iter()
        .map(|(endpoint, items)| (endpoint.to_string(), summarize(&items)))
        .collect()
}

fn summarize(records: &[&RunRecord]) -> Vec<SubjectSummary> {
    let mut grouped: BTreeMap<&SubjectId, Vec<&RunRecord>> = BTreeMap::new();
    for record in records.iter().copied() {
        grouped.entry(&record.subject).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(subject, items)| SubjectSummary {
            subject: subject.clone(),
            name: items[0].subject_name.clone(),
            records: items.len(),
            emissions_g: average(Metric::EmissionsG, &items),
            emissions_per_request_mg: average(Metric::EmissionsPerRequestMg, &items),
            requests_per_second: average(Metric::RequestsPerSecond, &items),
            mean_response_ms: average(Metric::MeanResponseMs, &items),
            cpu_percent: average(Metric::CpuAvgPercent, &items),
            memory_mb: average(Metric::MemoryAvgMb, &items),
        })
        .collect()
}

/// Best subject for `metric` by plain average.
pub fn best_by_average(
    summaries: &[SubjectSummary],
    metric: Metric,
) -> Option<(&SubjectSummary, f64)> {
    let direction = metric.direction();
    summaries
        .iter()
        .filter_map(|s| s.value(metric).map(|v| (s, v)))
        .fold(None, |best, (s, v)| match best {
            Some((_, incumbent)) if !direction.prefers(v, incumbent) => best,
            _ => Some((s, v)),
        })
}

/// Statistical analyses per (load, endpoint) slice.
pub fn analyze_slices(
    records: &[RunRecord],
    engine: &StatisticsEngine,
) -> Vec<((u32, String), Vec<MetricAnalysis>)> {
    slices(records)
        .into_iter()
        .map(|(key, items)| {
            let analyses = COMPARED_METRICS
                .iter()
                .map(|metric| engine.analyze(*metric, &items))
                .filter(|a| !a.descriptive.is_empty())
                .collect();
            (key, analyses)
        })
        .collect()
}

fn opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "N/A".to_string(),
    }
}

fn p_value(p: Option<f64>) -> String {
    match p {
        Some(p) if p < 0.001 => "< 0.001".to_string(),
        Some(p) => format!("{:.4}", p),
        None => "N/A".to_string(),
    }
}

/// Render the full report.
pub fn render(
    records: &[RunRecord],
    engine: &StatisticsEngine,
    generated: DateTime<Utc>,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let summaries = subject_summaries(records);
    let repetitions = detect_repetitions(records);

    writeln!(out, "# Energy & Performance Comparison Report")?;
    writeln!(out)?;
    writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;
    writeln!(out, "Total records: {}  ", records.len())?;
    writeln!(out, "Runs per configuration: {}", repetitions)?;
    writeln!(out)?;

    write_summary(&mut out, &summaries)?;
    write_reliability(&mut out, records)?;
    write_statistics(&mut out, records, engine, repetitions)?;
    write_details(&mut out, records)?;
    write_findings(&mut out, records, &summaries)?;
    write_methodology(&mut out, engine, repetitions)?;
    Ok(out)
}

fn write_summary(out: &mut String, summaries: &[SubjectSummary]) -> fmt::Result {
    writeln!(out, "## Subject Summary")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Subject | Records | Avg Emissions (g CO2) | Per Request (mg CO2) | Avg RPS | Avg Response Time (ms) | Avg CPU (%) | Avg Memory (MB) |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|---|")?;
    for s in summaries {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            s.name,
            s.records,
            opt(s.emissions_g, 3),
            opt(s.emissions_per_request_mg, 3),
            opt(s.requests_per_second, 2),
            opt(s.mean_response_ms, 2),
            opt(s.cpu_percent, 1),
            opt(s.memory_mb, 1),
        )?;
    }
    writeln!(out)
}

fn write_reliability(out: &mut String, records: &[RunRecord]) -> fmt::Result {
    let breakdown = ReliabilityBreakdown::from_records(records);
    let total = breakdown.total().max(1) as f64;

    writeln!(out, "## Measurement Reliability")?;
    writeln!(out)?;
    writeln!(out, "| Classification | Tracked duration | Records | Share |")?;
    writeln!(out, "|---|---|---|---|")?;
    for (label, window, count) in [
        ("Reliable", format!(">= {RELIABLE_MIN_SECS}s"), breakdown.reliable),
        (
            "Marginal",
            format!("{MARGINAL_MIN_SECS}s to {RELIABLE_MIN_SECS}s"),
            breakdown.marginal,
        ),
        ("Unreliable", format!("< {MARGINAL_MIN_SECS}s"), breakdown.unreliable),
        ("Unknown", "no telemetry".to_string(), breakdown.unknown),
    ] {
        writeln!(
            out,
            "| {} | {} | {} | {:.1}% |",
            label,
            window,
            count,
            count as f64 / total * 100.0
        )?;
    }
    writeln!(out)?;

    let disagreements = records
        .iter()
        .filter(|r| resolve(r).duration_disagreement.is_some())
        .count();
    if disagreements > 0 {
        writeln!(
            out,
            "{} record(s) carry a stored classification that differs from their tracked duration; the stored value is used.",
            disagreements
        )?;
        writeln!(out)?;
    }

    writeln!(out, "**Limitations**")?;
    writeln!(out)?;
    writeln!(
        out,
        "- Energy figures come from an external tracker. When it cannot read hardware counters it estimates CPU power from the processor's TDP, which flattens differences between subjects."
    )?;
    writeln!(
        out,
        "- Tracking is system-wide: background activity on the host is attributed to whichever subject was under test."
    )?;
    writeln!(
        out,
        "- Windows shorter than {MARGINAL_MIN_SECS}s hold too few tracker samples to separate subjects; treat unreliable energy numbers as indicative only."
    )?;
    writeln!(out)
}

fn write_statistics(
    out: &mut String,
    records: &[RunRecord],
    engine: &StatisticsEngine,
    repetitions: u32,
) -> fmt::Result {
    writeln!(out, "## Statistical Analysis")?;
    writeln!(out)?;

    if !engine.backend().is_available() {
        writeln!(
            out,
            "> **Warning:** no statistics backend is available ({}); significance tests were skipped.",
            engine.backend().name()
        )?;
        return writeln!(out);
    }
    if repetitions < 2 {
        writeln!(
            out,
            "> **Warning:** only {} run per configuration was found; at least 2 independent runs are needed for confidence intervals and significance tests.",
            repetitions
        )?;
        return writeln!(out);
    }

    for ((load, endpoint), analyses) in analyze_slices(records, engine) {
        writeln!(out, "### {} requests, `{}` endpoint", load, endpoint)?;
        writeln!(out)?;
        for analysis in &analyses {
            write_metric_analysis(out, analysis)?;
        }
    }
    Ok(())
}

fn write_metric_analysis(out: &mut String, analysis: &MetricAnalysis) -> fmt::Result {
    writeln!(out, "#### {}", analysis.metric.label())?;
    writeln!(out)?;
    writeln!(out, "| Subject | n | Mean | Std Dev | 95% CI |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for (subject, stats) in &analysis.descriptive {
        let ci = match stats.ci95 {
            Some(ci) => format!("[{:.4}, {:.4}]", ci.lower, ci.upper),
            None => "N/A".to_string(),
        };
        writeln!(
            out,
            "| {} | {} | {:.4} | {} | {} |",
            subject,
            stats.n,
            stats.mean,
            opt(stats.std_dev, 4),
            ci
        )?;
    }
    writeln!(out)?;

    let omnibus = &analysis.comparison.omnibus;
    match (omnibus.f_stat, omnibus.df_between, omnibus.df_within) {
        (Some(f), Some(dfb), Some(dfw)) => writeln!(
            out,
            "ANOVA: F({:.0}, {:.0}) = {:.3}, p = {}, eta squared = {} {}",
            dfb,
            dfw,
            f,
            p_value(omnibus.p_value),
            opt(omnibus.eta_squared, 3),
            omnibus.significance.tag()
        )?,
        _ => writeln!(
            out,
            "ANOVA: not run ({})",
            omnibus.diagnostic.as_deref().unwrap_or("insufficient data")
        )?,
    }
    if let (Some(diagnostic), Some(_)) = (&omnibus.diagnostic, omnibus.f_stat) {
        writeln!(out)?;
        writeln!(out, "_{}_", diagnostic)?;
    }
    writeln!(out)?;

    if !analysis.comparison.pairwise.is_empty() {
        writeln!(
            out,
            "| Comparison | Mean A | Mean B | p (Bonferroni) | Cohen's d | Effect | Result |"
        )?;
        writeln!(out, "|---|---|---|---|---|---|---|")?;
        for pair in &analysis.comparison.pairwise {
            writeln!(
                out,
                "| {} vs {} | {:.4} | {:.4} | {} | {:.2} | {} | {} |",
                pair.a,
                pair.b,
                pair.mean_a,
                pair.mean_b,
                p_value(pair.corrected_p),
                pair.cohens_d,
                pair.effect,
                pair.significance.tag()
            )?;
        }
        writeln!(out)?;
    }

    if let Some(winner) = &analysis.winner {
        writeln!(out, "**Winner:** {}", winner.statement)?;
        if let Some(caveat) = &winner.caveat {
            writeln!(out)?;
            writeln!(out, "> {}", caveat)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_details(out: &mut String, records: &[RunRecord]) -> fmt::Result {
    let mut sorted: Vec<&RunRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.subject_name, a.load_size, &a.endpoint_name, a.run_index).cmp(&(
            &b.subject_name,
            b.load_size,
            &b.endpoint_name,
            b.run_index,
        ))
    });

    writeln!(out, "## Detailed Results")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Subject | Load | Endpoint | Run | Emissions (g) | Per Req (mg) | RPS | Mean (ms) | P95 (ms) | Success (%) | Reliability |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|---|---|---|---|")?;
    for r in sorted {
        let emissions_ok = r.emissions.is_ok();
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {:.2} | {:.2} | {:.2} | {:.1} | {} |",
            r.subject_name,
            r.load_size,
            r.endpoint_name,
            r.run_index.map_or_else(|| "-".to_string(), |n| n.to_string()),
            opt(emissions_ok.then(|| r.emissions_g()), 3),
            opt(emissions_ok.then_some(r.avg_emissions_per_request_mg), 3),
            r.requests_per_second,
            r.response_time_stats.mean_ms,
            r.response_time_stats.p95_ms,
            r.success_rate,
            resolve(r).classification
        )?;
    }
    writeln!(out)
}

fn write_findings(
    out: &mut String,
    records: &[RunRecord],
    summaries: &[SubjectSummary],
) -> fmt::Result {
    writeln!(out, "## Key Findings")?;
    writeln!(out)?;

    if let Some((s, v)) = best_by_average(summaries, Metric::EmissionsG) {
        writeln!(out, "- **Most Energy Efficient**: {} ({:.3}g CO2 average)", s.name, v)?;
    }
    if let Some((s, v)) = best_by_average(summaries, Metric::EmissionsPerRequestMg) {
        writeln!(out, "- **Lowest Per-Request Emissions**: {} ({:.3}mg CO2)", s.name, v)?;
    }
    if let Some((s, v)) = best_by_average(summaries, Metric::RequestsPerSecond) {
        writeln!(out, "- **Highest Throughput**: {} ({:.2} requests/second)", s.name, v)?;
    }
    if let Some((s, v)) = best_by_average(summaries, Metric::MeanResponseMs) {
        writeln!(out, "- **Fastest Response Time**: {} ({:.2}ms)", s.name, v)?;
    }

    let breakdown = ReliabilityBreakdown::from_records(records);
    if breakdown.unreliable > 0 {
        writeln!(
            out,
            "- {:.0}% of records are unreliable for energy comparison; emissions rankings above may not hold.",
            breakdown.unreliable_fraction() * 100.0
        )?;
    }
    writeln!(
        out,
        "- Averages above pool every load and endpoint; see the statistical section for like-for-like, significance-qualified comparisons."
    )?;
    writeln!(out)
}

fn write_methodology(out: &mut String, engine: &StatisticsEngine, repetitions: u32) -> fmt::Result {
    writeln!(out, "## Methodology")?;
    writeln!(out)?;
    writeln!(
        out,
        "- Each configuration (subject, load, endpoint) was measured {} time(s); repeated runs were scheduled round-robin across all configurations so drift affects every subject alike.",
        repetitions
    )?;
    writeln!(
        out,
        "- Every run was preceded by a health check and warmup requests that are not measured."
    )?;
    writeln!(
        out,
        "- Load above the concurrency threshold is issued by a bounded worker pool; latency percentiles use the nearest-rank method over successful requests only."
    )?;
    writeln!(
        out,
        "- CPU and memory are sampled from the subject's container in the background for the duration of the load."
    )?;
    writeln!(
        out,
        "- Measurement windows of at least {RELIABLE_MIN_SECS}s are reliable, {MARGINAL_MIN_SECS}s to {RELIABLE_MIN_SECS}s marginal, shorter unreliable."
    )?;
    writeln!(
        out,
        "- Inference: one-way ANOVA across subjects, Welch's t-test per pair with Bonferroni correction, Cohen's d for effect size; significance level {}.",
        ALPHA
    )?;
    writeln!(out, "- Statistics backend: {}.", engine.backend().name())
}
