// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP load driver.
//!
//! Small loads are issued strictly one after another. Larger loads are
//! dispatched across a bounded worker pool; completion order is not
//! preserved. Every request carries its own timeout and is never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ecobench_core::{LatencyStats, LoadSize, Settings};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::metrics::{latency_stats, throughput};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Knobs for one load driver.
#[derive(Debug, Clone, Copy)]
pub struct LoadSettings {
    /// Loads at or below this many requests run sequentially.
    pub concurrency_threshold: u32,
    /// Upper bound on in-flight requests in concurrent mode.
    pub max_workers: usize,
    pub request_timeout: Duration,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            concurrency_threshold: 100,
            max_workers: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Settings> for LoadSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            concurrency_threshold: settings.concurrency_threshold,
            max_workers: settings.max_workers,
            request_timeout: settings.request_timeout,
        }
    }
}

/// Result of one load phase.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub success_count: u32,
    pub error_count: u32,
    /// Ascending, one entry per success.
    pub response_times_ms: Vec<f64>,
    pub stats: LatencyStats,
    pub elapsed: Duration,
    pub requests_per_second: f64,
    pub workers: usize,
}

impl LoadOutcome {
    fn from_samples(requests: u32, mut samples: Vec<f64>, elapsed: Duration, workers: usize) -> Self {
        let success_count = samples.len() as u32;
        let stats = latency_stats(&mut samples);
        Self {
            success_count,
            error_count: requests - success_count,
            response_times_ms: samples,
            stats,
            elapsed,
            requests_per_second: throughput(requests, elapsed),
            workers,
        }
    }

    /// Successful requests as a percentage of the load.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64 * 100.0
    }
}

pub struct LoadDriver {
    client: Client,
    settings: LoadSettings,
}

impl LoadDriver {
    pub fn new(settings: LoadSettings) -> Result<Self, LoadError> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self { client, settings })
    }

    /// Worker pool width for a load of `requests`: `min(max_workers, N/10)`,
    /// at least one.
    pub fn worker_count(&self, requests: u32) -> usize {
        self.settings
            .max_workers
            .min(requests as usize / 10)
            .max(1)
    }

    pub fn is_sequential(&self, requests: u32) -> bool {
        requests <= self.settings.concurrency_threshold
    }

    /// Issue `load` requests against `url` and collect outcomes.
    pub async fn execute(&self, url: &str, load: LoadSize) -> LoadOutcome {
        let requests = load.value();
        let start = Instant::now();

        let (samples, workers) = if self.is_sequential(requests) {
            debug!(url, requests, "Running sequential load");
            (self.run_sequential(url, requests).await, 1)
        } else {
            let workers = self.worker_count(requests);
            debug!(url, requests, workers, "Running concurrent load");
            (self.run_concurrent(url, requests, workers).await, workers)
        };

        let outcome = LoadOutcome::from_samples(requests, samples, start.elapsed(), workers);
        if outcome.error_count > 0 {
            warn!(
                url,
                errors = outcome.error_count,
                requests,
                "Requests failed during load phase"
            );
        }
        outcome
    }

    /// Fire `requests` sequential requests and discard the results.
    /// Returns the number that succeeded.
    pub async fn warmup(&self, url: &str, requests: u32) -> u32 {
        let mut ok = 0;
        for _ in 0..requests {
            if send(&self.client, url).await.is_some() {
                ok += 1;
            }
        }
        debug!(url, requests, ok, "Warmup complete");
        ok
    }

    async fn run_sequential(&self, url: &str, requests: u32) -> Vec<f64> {
        let mut samples = Vec::with_capacity(requests as usize);
        let mut progress = Progress::new(requests);
        for _ in 0..requests {
            if let Some(ms) = send(&self.client, url).await {
                samples.push(ms);
            }
            progress.tick();
        }
        samples
    }

    async fn run_concurrent(&self, url: &str, requests: u32, workers: usize) -> Vec<f64> {
        let semaphore = Arc::new(Semaphore::new(workers));
        let url: Arc<str> = Arc::from(url);
        let mut tasks = JoinSet::new();

        for _ in 0..requests {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let url = Arc::clone(&url);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                send(&client, &url).await
            });
        }

        let mut samples = Vec::with_capacity(requests as usize);
        let mut progress = Progress::new(requests);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(ms)) => samples.push(ms),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Request task failed"),
            }
            progress.tick();
        }
        samples
    }
}

/// One request. `Some(latency_ms)` on HTTP 200, `None` on anything else.
async fn send(client: &Client, url: &str) -> Option<f64> {
    let start = Instant::now();
    match client.get(url).send().await {
        Ok(response) if response.status() == StatusCode::OK => {
            let ms = start.elapsed().as_secs_f64() * 1_000.0;
            // Drain the body so the connection can be reused.
            let _ = response.bytes().await;
            Some(ms)
        }
        Ok(response) => {
            debug!(url, status = %response.status(), "Non-200 response");
            None
        }
        Err(e) => {
            debug!(url, error = %e, "Request failed");
            None
        }
    }
}

/// Logs completion every 10% at debug.
struct Progress {
    total: u32,
    done: u32,
    step: u32,
}

impl Progress {
    fn new(total: u32) -> Self {
        Self {
            total,
            done: 0,
            step: (total / 10).max(1),
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        if self.done % self.step == 0 || self.done == self.total {
            debug!(done = self.done, total = self.total, "Load progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(threshold: u32, max_workers: usize) -> LoadDriver {
        LoadDriver::new(LoadSettings {
            concurrency_threshold: threshold,
            max_workers,
            request_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_worker_count() {
        let d = driver(100, 100);
        assert_eq!(d.worker_count(1000), 100);
        assert_eq!(d.worker_count(10_000), 100);
        assert_eq!(d.worker_count(500), 50);
        assert_eq!(d.worker_count(5), 1);
    }

    #[test]
    fn test_sequential_threshold() {
        let d = driver(100, 100);
        assert!(d.is_sequential(100));
        assert!(!d.is_sequential(101));
    }

    #[tokio::test]
    async fn test_unreachable_target_counts_errors() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let d = driver(100, 100);
        let url = format!("http://127.0.0.1:{}/", port);
        let outcome = d.execute(&url, LoadSize::new(5).unwrap()).await;
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.error_count, 5);
        assert!(outcome.response_times_ms.is_empty());
        assert_eq!(outcome.success_rate(), 0.0);
    }
}
