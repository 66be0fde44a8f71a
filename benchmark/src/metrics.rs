// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Latency and host metrics.
//!
//! Percentiles use nearest-rank indexing on the sorted sample
//! (`index = floor(q * len)`, clamped to the last element), never
//! interpolation.

use std::time::Duration;

use ecobench_core::{HostInfo, LatencyStats};
use sysinfo::System;

/// Value at quantile `q` of an ascending sample. 0.0 when empty.
pub fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Summarise a response-time sample in milliseconds. Sorts in place.
pub fn latency_stats(samples: &mut [f64]) -> LatencyStats {
    if samples.is_empty() {
        return LatencyStats::default();
    }

    samples.sort_by(f64::total_cmp);
    let len = samples.len();

    LatencyStats {
        min_ms: samples[0],
        max_ms: samples[len - 1],
        mean_ms: samples.iter().sum::<f64>() / len as f64,
        median_ms: samples[len / 2],
        p95_ms: nearest_rank(samples, 0.95),
        p99_ms: nearest_rank(samples, 0.99),
    }
}

/// Requests per second over a measured span.
pub fn throughput(requests: u32, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        requests as f64 / secs
    } else {
        0.0
    }
}

/// Format a millisecond latency in human-readable form (auto-selects μs/ms/s).
pub fn format_latency_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}μs", ms * 1_000.0)
    } else if ms < 1_000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1_000.0)
    }
}

/// Collect current host information.
pub fn collect_host_info() -> HostInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    HostInfo {
        os: System::name().unwrap_or_else(|| "Unknown".to_string()),
        os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
        kernel_version: System::kernel_version(),
        cpu_model: sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: sys.cpus().len(),
        memory_bytes: sys.total_memory(),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats_from_samples() {
        let mut samples = vec![100.0, 900.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 200.0, 1000.0];
        let stats = latency_stats(&mut samples);

        assert_eq!(stats.min_ms, 100.0);
        assert_eq!(stats.max_ms, 1000.0);
        assert_eq!(stats.median_ms, 600.0);
        assert!((stats.mean_ms - 550.0).abs() < 0.01);
        // floor(0.95 * 10) = 9
        assert_eq!(stats.p95_ms, 1000.0);
        assert_eq!(samples[0], 100.0);
    }

    #[test]
    fn test_nearest_rank_indices() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(nearest_rank(&sorted, 0.95), 96.0);
        assert_eq!(nearest_rank(&sorted, 0.99), 100.0);
        assert_eq!(nearest_rank(&[7.0], 0.99), 7.0);
        assert_eq!(nearest_rank(&[], 0.5), 0.0);
    }

    #[test]
    fn test_percentiles_ordered() {
        for len in 1..60 {
            let mut samples: Vec<f64> = (0..len).map(|i| ((i * 37) % 23) as f64).collect();
            let stats = latency_stats(&mut samples);
            assert!(stats.median_ms <= stats.p95_ms);
            assert!(stats.p95_ms <= stats.p99_ms);
            assert!(stats.p99_ms <= stats.max_ms);
        }
    }

    #[test]
    fn test_throughput() {
        assert!((throughput(1000, Duration::from_secs(2)) - 500.0).abs() < 1e-9);
        assert_eq!(throughput(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_latency_format() {
        assert_eq!(format_latency_ms(0.5), "500μs");
        assert_eq!(format_latency_ms(1.5), "1.50ms");
        assert_eq!(format_latency_ms(1500.0), "1.50s");
    }

    #[test]
    fn test_host_info_collect() {
        let info = collect_host_info();
        assert!(!info.os.is_empty());
        assert!(info.cpu_cores > 0);
        assert!(info.memory_bytes > 0);
    }
}
