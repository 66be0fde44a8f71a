//! ecobench Core Library
//!
//! Data model and analysis side of the ecobench framework benchmark.
//! Provides validated configuration and the subject registry, persisted run
//! records and their result store, measurement reliability classification,
//! and the statistics engine.

pub mod config;
pub mod error;
pub mod record;
pub mod reliability;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    Config, ConfigLoader, Endpoint, Registry, Settings, StartupConfig, Subject, TrackerConfig,
};
pub use error::{EcoError, EcoResult, HardValidationError, StoreError};
pub use record::{
    Aggregate, BenchmarkConfiguration, EmissionsReport, HostInfo, LatencyStats, MemoryAggregate,
    PowerMeasurement, ResourceSample, ResourceSummary, RunRecord, StartupMeasurement,
    StartupSummary,
};
pub use reliability::{Reliability, ReliabilityBreakdown, ReliabilityResolution};
pub use stats::{Metric, StatisticsEngine};
pub use store::{LoadedRecords, ResultStore};
pub use types::{LoadSize, Port, SubjectId};
