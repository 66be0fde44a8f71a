// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark orchestration.
//!
//! Builds the configuration matrix, schedules repeated runs round-robin and
//! drives probe, tracker, monitor and load driver for each run. Each run is
//! self-contained; a failure affects only that run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use ecobench_core::reliability::resolve;
use ecobench_core::{
    BenchmarkConfiguration, Config, EcoError, HostInfo, LoadSize, Registry, ResultStore,
    RunRecord, Settings, StoreError, Subject,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::emissions::{nested_reliability, ConfiguredTracker, EmissionsAdapter, EnergyTracker};
use crate::load::{LoadDriver, LoadError, LoadSettings};
use crate::metrics::collect_host_info;
use crate::monitor::{DockerStatsQuery, ResourceMonitor, ResourceQuery};
use crate::probe::{HealthProbe, ProbeError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] EcoError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Health check failed: {0}")]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Runs must be at least 1")]
    NoRuns,
}

/// One entry of the execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    pub config: BenchmarkConfiguration,
    /// `Some` iff more than one run was requested.
    pub run_index: Option<u32>,
}

/// Cartesian product subjects × loads × endpoints, in registry order.
pub fn build_matrix(registry: &Registry) -> Vec<BenchmarkConfiguration> {
    let mut configs =
        Vec::with_capacity(registry.subjects.len() * registry.loads.len() * registry.endpoints.len());
    for subject in &registry.subjects {
        for load in &registry.loads {
            for endpoint in &registry.endpoints {
                configs.push(BenchmarkConfiguration::new(
                    subject.id.clone(),
                    *load,
                    endpoint.name.clone(),
                ));
            }
        }
    }
    configs
}

/// Round-robin order: every configuration once per round, `runs` rounds.
pub fn schedule(configs: &[BenchmarkConfiguration], runs: u32) -> Vec<ScheduledRun> {
    (1..=runs)
        .flat_map(|round| {
            configs.iter().map(move |config| ScheduledRun {
                config: config.clone(),
                run_index: (runs > 1).then_some(round),
            })
        })
        .collect()
}

/// Narrow a registry to the named subjects, loads and endpoints. Empty
/// selections keep everything. Loads outside the registry are allowed.
pub fn narrow_registry(
    registry: &Registry,
    subjects: &[String],
    loads: &[u32],
    endpoints: &[String],
) -> Result<Registry, OrchestratorError> {
    let subjects = if subjects.is_empty() {
        registry.subjects.clone()
    } else {
        subjects
            .iter()
            .map(|s| registry.subject(s).cloned())
            .collect::<Result<_, _>>()?
    };
    let loads = if loads.is_empty() {
        registry.loads.clone()
    } else {
        loads
            .iter()
            .map(|l| LoadSize::new(*l).map_err(EcoError::from))
            .collect::<Result<_, _>>()?
    };
    let endpoints = if endpoints.is_empty() {
        registry.endpoints.clone()
    } else {
        endpoints
            .iter()
            .map(|e| registry.endpoint(e).cloned())
            .collect::<Result<_, _>>()?
    };
    Ok(Registry {
        subjects,
        loads,
        endpoints,
    })
}

/// Per-subject measurement instruments.
pub trait Instrumentation: Send + Sync {
    type Tracker: EnergyTracker;
    type Query: ResourceQuery;

    fn tracker(&self, subject: &Subject) -> Self::Tracker;
    fn resource_query(&self, subject: &Subject) -> Self::Query;
}

/// Configured tracker command plus `docker stats` on the subject's container.
#[derive(Debug, Clone)]
pub struct DockerInstrumentation {
    config: ecobench_core::TrackerConfig,
    results_dir: PathBuf,
    container_binary: String,
}

impl DockerInstrumentation {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.tracker.clone(),
            results_dir: config.settings.results_dir.clone(),
            container_binary: config.startup.container_binary.clone(),
        }
    }
}

impl Instrumentation for DockerInstrumentation {
    type Tracker = ConfiguredTracker;
    type Query = DockerStatsQuery;

    fn tracker(&self, _subject: &Subject) -> ConfiguredTracker {
        ConfiguredTracker::from_config(&self.config, &self.results_dir)
    }

    fn resource_query(&self, subject: &Subject) -> DockerStatsQuery {
        DockerStatsQuery::new(&self.container_binary, &subject.container)
    }
}

/// Options for one batch.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub runs: u32,
    /// Pad the tracked window up to this duration.
    pub min_duration: Option<Duration>,
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub records: Vec<RunRecord>,
    pub skipped: Vec<(ScheduledRun, String)>,
    pub batch_file: Option<PathBuf>,
}

pub struct Orchestrator<I> {
    registry: Registry,
    settings: Settings,
    instruments: I,
    store: ResultStore,
    driver: LoadDriver,
    probe: HealthProbe,
    host: HostInfo,
}

impl<I: Instrumentation> Orchestrator<I> {
    /// Build an orchestrator over an explicit registry.
    pub fn new(
        registry: Registry,
        settings: Settings,
        instruments: I,
    ) -> Result<Self, OrchestratorError> {
        let store = ResultStore::create(&settings.results_dir)?;
        let driver = LoadDriver::new(LoadSettings::from(&settings))?;
        let probe = HealthProbe::new(settings.probe_timeout)?;
        Ok(Self {
            registry,
            settings,
            instruments,
            store,
            driver,
            probe,
            host: collect_host_info(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Execute every configuration `options.runs` times, round-robin.
    ///
    /// Failed runs are reported in the summary and never abort the batch.
    pub async fn run_batch(
        &self,
        configs: &[BenchmarkConfiguration],
        options: RunOptions,
    ) -> Result<BatchSummary, OrchestratorError> {
        if options.runs == 0 {
            return Err(OrchestratorError::NoRuns);
        }
        let plan = schedule(configs, options.runs);
        let total = plan.len();
        info!(
            configurations = configs.len(),
            runs = options.runs,
            total,
            "Starting benchmark batch"
        );

        let mut summary = BatchSummary::default();
        for (i, run) in plan.into_iter().enumerate() {
            if i > 0 && !self.settings.inter_test_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_test_delay).await;
            }
            info!(
                progress = %format!("{}/{}", i + 1, total),
                config = %run.config,
                run = ?run.run_index,
                "Running configuration"
            );

            match self.run_one(&run, options.min_duration).await {
                Ok(record) => summary.records.push(record),
                Err(e) => {
                    warn!(config = %run.config, error = %e, "Run skipped");
                    summary.skipped.push((run, e.to_string()));
                }
            }
        }

        if !summary.records.is_empty() {
            let path = self.store.save_batch(&summary.records)?;
            info!(path = %path.display(), records = summary.records.len(), "Batch saved");
            summary.batch_file = Some(path);
        }
        Ok(summary)
    }

    /// Execute and persist one run.
    pub async fn run_one(
        &self,
        run: &ScheduledRun,
        min_duration: Option<Duration>,
    ) -> Result<RunRecord, OrchestratorError> {
        let config = &run.config;
        let subject = self.registry.subject(config.subject.as_str())?;
        let endpoint = self.registry.endpoint(&config.endpoint)?;
        let url = subject.url(&endpoint.path);

        // Nothing is tracked or written for an unhealthy subject.
        self.probe
            .check(&subject.url(&self.settings.health_path))
            .await?;

        if self.settings.warmup_requests > 0 {
            self.driver.warmup(&url, self.settings.warmup_requests).await;
            tokio::time::sleep(self.settings.warmup_pause).await;
        }

        let test_id = match run.run_index {
            Some(n) => format!("{}_run{}", config.test_id(), n),
            None => config.test_id(),
        };
        let mut adapter = EmissionsAdapter::new(self.instruments.tracker(subject));
        adapter.start(&test_id).await;
        let tracked_start = Instant::now();

        let monitor = ResourceMonitor::start(
            self.instruments.resource_query(subject),
            self.settings.monitor_interval,
            self.settings.monitor_stop_timeout,
        );
        let outcome = self.driver.execute(&url, config.load_size).await;
        let resources = monitor.stop().await;

        let load_secs = outcome.elapsed.as_secs_f64();
        let padding = min_duration
            .or(self.settings.min_duration)
            .and_then(|min| min.checked_sub(outcome.elapsed))
            .unwrap_or(Duration::ZERO);
        if !padding.is_zero() {
            info!(padding_secs = padding.as_secs_f64(), "Padding tracked window");
            tokio::time::sleep(padding).await;
        }
        let tracked_secs = load_secs + padding.as_secs_f64();

        let mut emissions = adapter.stop().await;
        let duration_seconds = tracked_start.elapsed().as_secs_f64();
        emissions.reliability = Some(nested_reliability(&emissions, tracked_secs));

        let load = config.load_size.value();
        let mut record = RunRecord {
            id: Uuid::new_v4(),
            subject: subject.id.clone(),
            subject_name: subject.name.clone(),
            load_size: load,
            endpoint_name: endpoint.name.clone(),
            endpoint_path: endpoint.path.clone(),
            timestamp: Utc::now(),
            run_index: run.run_index,
            duration_seconds,
            test_duration_seconds: load_secs,
            tracked_duration_seconds: Some(tracked_secs),
            padding_seconds: padding.as_secs_f64(),
            success_count: outcome.success_count,
            error_count: outcome.error_count,
            success_rate: outcome.success_rate(),
            requests_per_second: outcome.requests_per_second,
            response_times_ms: outcome.response_times_ms,
            response_time_stats: outcome.stats,
            avg_emissions_per_request_mg: emissions.emissions_kg * 1e6 / load as f64,
            emissions,
            resources,
            measurement_reliability: None,
            host: Some(self.host.clone()),
        };
        record.measurement_reliability = Some(resolve(&record).classification);

        let path = self.store.save_run(&record)?;
        info!(
            path = %path.display(),
            rps = %format!("{:.1}", record.requests_per_second),
            success_rate = %format!("{:.1}", record.success_rate),
            reliability = ?record.measurement_reliability,
            "Run recorded"
        );
        Ok(record)
    }
}

impl Orchestrator<DockerInstrumentation> {
    /// Orchestrator wired to the real tracker and container tooling.
    pub fn from_config(config: &Config) -> Result<Self, OrchestratorError> {
        Self::new(
            config.registry.clone(),
            config.settings.clone(),
            DockerInstrumentation::from_config(config),
        )
    }
}
