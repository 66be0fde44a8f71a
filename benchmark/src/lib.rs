// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! ecobench Measurement Pipeline
//!
//! Drives HTTP load against the services under test and measures what it
//! costs them.
//!
//! # Components
//!
//! - **Load Driver**: fixed-count request bursts, sequential or bounded-concurrent
//! - **Resource Monitor**: periodic CPU/memory sampling of the subject's container
//! - **Emissions Adapter**: external energy tracker lifecycle and telemetry parsing
//! - **Orchestrator**: round-robin scheduling of the configuration matrix
//! - **Cold Start**: container restart to first healthy answer

pub mod container;
pub mod emissions;
pub mod load;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod probe;
pub mod startup;

pub use container::{ContainerCli, ContainerError, ContainerRuntime};
pub use emissions::{
    CommandTracker, ConfiguredTracker, DisabledTracker, EmissionsAdapter, EmissionsError,
    EnergyTracker,
};
pub use load::{LoadDriver, LoadError, LoadOutcome, LoadSettings};
pub use metrics::{collect_host_info, format_latency_ms, latency_stats};
pub use monitor::{DockerStatsQuery, MonitorError, Reading, ResourceMonitor, ResourceQuery};
pub use orchestrator::{
    build_matrix, narrow_registry, schedule, BatchSummary, DockerInstrumentation,
    Instrumentation, Orchestrator, OrchestratorError, RunOptions, ScheduledRun,
};
pub use probe::{HealthProbe, ProbeError};
pub use startup::{summarize, StartupBenchmark};
