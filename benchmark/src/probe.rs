// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Health probing of services under test.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Unhealthy { url: String, status: StatusCode },

    #[error("{url} not healthy after {waited:?}")]
    TimedOut { url: String, waited: Duration },
}

/// Single-request health check with its own timeout.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: Client,
}

impl HealthProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::Client)?;
        Ok(Self { client })
    }

    /// `Ok` iff the endpoint answers HTTP 200.
    pub async fn check(&self, url: &str) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProbeError::Unreachable {
                url: url.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Unhealthy {
                url: url.to_string(),
                status,
            }),
        }
    }

    /// Poll until the first healthy answer. Returns the elapsed time.
    pub async fn wait_until_healthy(
        &self,
        url: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        loop {
            match self.check(url).await {
                Ok(()) => return Ok(start.elapsed()),
                Err(e) => debug!(url, error = %e, "Not healthy yet"),
            }
            if start.elapsed() + poll_interval > timeout {
                return Err(ProbeError::TimedOut {
                    url: url.to_string(),
                    waited: start.elapsed(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
