// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! The subject/port/name registry, the load matrix and every pipeline
//! timing knob live here. Configuration is validated once at startup and then
//! passed explicitly into the orchestrator; nothing reads it as global state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EcoError, EcoResult, HardValidationError};
use crate::types::{LoadSize, Port, SubjectId};

/// Built-in registry: six framework services on consecutive ports.
pub const DEFAULT_CONFIG: &str = r#"
settings:
  results_dir: test_results
  health_path: /api/v1/health

tracker:
  command: ["codecarbon", "monitor", "--no-api"]
  output_file: emissions.csv

subjects:
  - id: fastapi
    name: FastAPI
    port: 8000
    container: fastapi-carbon-test
  - id: django
    name: Django
    port: 8001
    container: django-carbon-test
  - id: springboot
    name: Spring Boot
    port: 8002
    container: springboot-carbon-test
  - id: micronaut
    name: Micronaut
    port: 8003
    container: micronaut-carbon-test
  - id: gin
    name: Gin
    port: 8004
    container: gin-carbon-test
  - id: chi
    name: Chi
    port: 8005
    container: chi-carbon-test

loads: [100, 1000, 10000]

endpoints:
  - name: light
    path: /api/v1/weather/analytics/light
  - name: medium
    path: /api/v1/weather/analytics/medium
  - name: heavy
    path: /api/v1/weather/analytics/heavy
"#;

/// Raw pipeline settings as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default = "default_results_dir")]
    results_dir: String,
    #[serde(default = "default_health_path")]
    health_path: String,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    probe_timeout_secs: u64,
    #[serde(default = "default_concurrency_threshold")]
    concurrency_threshold: u32,
    #[serde(default = "default_max_workers")]
    max_workers: usize,
    #[serde(default = "default_warmup_requests")]
    warmup_requests: u32,
    #[serde(default = "default_warmup_pause_secs")]
    warmup_pause_secs: u64,
    #[serde(default = "default_inter_test_delay_secs")]
    inter_test_delay_secs: u64,
    #[serde(default = "default_monitor_interval_ms")]
    monitor_interval_ms: u64,
    #[serde(default = "default_monitor_stop_timeout_secs")]
    monitor_stop_timeout_secs: u64,
    #[serde(default)]
    min_duration_secs: Option<f64>,
}

fn default_results_dir() -> String {
    "test_results".to_string()
}

fn default_health_path() -> String {
    "/api/v1/health".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_concurrency_threshold() -> u32 {
    100
}

fn default_max_workers() -> usize {
    100
}

fn default_warmup_requests() -> u32 {
    50
}

fn default_warmup_pause_secs() -> u64 {
    2
}

fn default_inter_test_delay_secs() -> u64 {
    5
}

fn default_monitor_interval_ms() -> u64 {
    1000
}

fn default_monitor_stop_timeout_secs() -> u64 {
    5
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            health_path: default_health_path(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            concurrency_threshold: default_concurrency_threshold(),
            max_workers: default_max_workers(),
            warmup_requests: default_warmup_requests(),
            warmup_pause_secs: default_warmup_pause_secs(),
            inter_test_delay_secs: default_inter_test_delay_secs(),
            monitor_interval_ms: default_monitor_interval_ms(),
            monitor_stop_timeout_secs: default_monitor_stop_timeout_secs(),
            min_duration_secs: None,
        }
    }
}

/// Raw energy tracker settings.
#[derive(Debug, Deserialize)]
struct RawTrackerConfig {
    #[serde(default)]
    command: Vec<String>,
    #[serde(default = "default_tracker_output")]
    output_file: String,
    #[serde(default = "default_tracker_stop_timeout_secs")]
    stop_timeout_secs: u64,
}

fn default_tracker_output() -> String {
    "emissions.csv".to_string()
}

fn default_tracker_stop_timeout_secs() -> u64 {
    15
}

impl Default for RawTrackerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            output_file: default_tracker_output(),
            stop_timeout_secs: default_tracker_stop_timeout_secs(),
        }
    }
}

/// Raw cold-start benchmark settings.
#[derive(Debug, Deserialize)]
struct RawStartupConfig {
    #[serde(default = "default_startup_repetitions")]
    repetitions: u32,
    #[serde(default = "default_startup_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_startup_poll_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_container_binary")]
    container_binary: String,
}

fn default_startup_repetitions() -> u32 {
    3
}

fn default_startup_timeout_secs() -> u64 {
    60
}

fn default_startup_poll_ms() -> u64 {
    250
}

fn default_container_binary() -> String {
    "docker".to_string()
}

impl Default for RawStartupConfig {
    fn default() -> Self {
        Self {
            repetitions: default_startup_repetitions(),
            timeout_secs: default_startup_timeout_secs(),
            poll_interval_ms: default_startup_poll_ms(),
            container_binary: default_container_binary(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_host")]
    host: String,
    port: u16,
    #[serde(default)]
    container: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    name: String,
    path: String,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    settings: RawSettings,
    #[serde(default)]
    tracker: RawTrackerConfig,
    #[serde(default)]
    startup: RawStartupConfig,
    subjects: Vec<RawSubject>,
    #[serde(default = "default_loads")]
    loads: Vec<u32>,
    endpoints: Vec<RawEndpoint>,
}

fn default_loads() -> Vec<u32> {
    vec![100, 1000, 10000]
}

/// One service under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub host: String,
    pub port: Port,
    pub container: String,
}

impl Subject {
    /// Base URL of the service, e.g. `http://localhost:8000`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Absolute URL for a path on this service.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// One equivalent endpoint exposed by every subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub path: String,
}

/// Immutable subject/load/endpoint registry.
#[derive(Debug, Clone)]
pub struct Registry {
    pub subjects: Vec<Subject>,
    pub loads: Vec<LoadSize>,
    pub endpoints: Vec<Endpoint>,
}

impl Registry {
    pub fn subject(&self, id: &str) -> EcoResult<&Subject> {
        self.subjects
            .iter()
            .find(|s| s.id.as_str().eq_ignore_ascii_case(id))
            .ok_or_else(|| match SubjectId::new(id) {
                Ok(id) => EcoError::SubjectNotFound(id),
                Err(e) => e.into(),
            })
    }

    pub fn endpoint(&self, name: &str) -> EcoResult<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| EcoError::EndpointNotFound(name.to_string()))
    }
}

/// Validated pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub results_dir: PathBuf,
    pub health_path: String,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub concurrency_threshold: u32,
    pub max_workers: usize,
    pub warmup_requests: u32,
    pub warmup_pause: Duration,
    pub inter_test_delay: Duration,
    pub monitor_interval: Duration,
    pub monitor_stop_timeout: Duration,
    pub min_duration: Option<Duration>,
}

/// External energy tracker invocation.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Program and arguments; empty disables energy tracking.
    /// `{test_id}` in any argument is replaced with the configuration label.
    pub command: Vec<String>,
    /// Telemetry CSV written by the tracker, relative to the results dir.
    /// Supports the same `{test_id}` placeholder.
    pub output_file: String,
    pub stop_timeout: Duration,
}

impl TrackerConfig {
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }
}

/// Cold-start benchmark settings.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub repetitions: u32,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub container_binary: String,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub tracker: TrackerConfig,
    pub startup: StartupConfig,
    pub registry: Registry,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> EcoResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EcoError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| EcoError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> EcoResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| EcoError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// The built-in registry.
    pub fn builtin() -> EcoResult<Config> {
        Self::load_string(DEFAULT_CONFIG)
    }

    fn validate(raw: RawConfig) -> EcoResult<Config> {
        let settings = Self::validate_settings(raw.settings)?;
        let tracker = Self::validate_tracker(raw.tracker)?;
        let startup = Self::validate_startup(raw.startup)?;
        let registry = Self::validate_registry(raw.subjects, raw.loads, raw.endpoints)?;

        Ok(Config {
            settings,
            tracker,
            startup,
            registry,
        })
    }

    fn validate_settings(raw: RawSettings) -> EcoResult<Settings> {
        if raw.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", 0, "Timeout must be greater than 0"));
        }

        if raw.probe_timeout_secs == 0 {
            return Err(invalid("probe_timeout_secs", 0, "Timeout must be greater than 0"));
        }

        if raw.max_workers == 0 || raw.max_workers > 1000 {
            return Err(invalid(
                "max_workers",
                raw.max_workers,
                "Must be between 1 and 1000",
            ));
        }

        if raw.monitor_interval_ms < 100 {
            return Err(invalid(
                "monitor_interval_ms",
                raw.monitor_interval_ms,
                "Sampling faster than 100ms would measure the sampler itself",
            ));
        }

        if !raw.health_path.starts_with('/') {
            return Err(invalid("health_path", &raw.health_path, "Path must start with '/'"));
        }

        let min_duration = match raw.min_duration_secs {
            Some(secs) if !secs.is_finite() || secs <= 0.0 => {
                return Err(invalid(
                    "min_duration_secs",
                    secs,
                    "Minimum duration must be a positive number of seconds",
                ));
            }
            Some(secs) => Some(Duration::from_secs_f64(secs)),
            None => None,
        };

        Ok(Settings {
            results_dir: PathBuf::from(raw.results_dir),
            health_path: raw.health_path,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            probe_timeout: Duration::from_secs(raw.probe_timeout_secs),
            concurrency_threshold: raw.concurrency_threshold,
            max_workers: raw.max_workers,
            warmup_requests: raw.warmup_requests,
            warmup_pause: Duration::from_secs(raw.warmup_pause_secs),
            inter_test_delay: Duration::from_secs(raw.inter_test_delay_secs),
            monitor_interval: Duration::from_millis(raw.monitor_interval_ms),
            monitor_stop_timeout: Duration::from_secs(raw.monitor_stop_timeout_secs.max(1)),
            min_duration,
        })
    }

    fn validate_tracker(raw: RawTrackerConfig) -> EcoResult<TrackerConfig> {
        if raw.command.iter().any(|arg| arg.is_empty()) {
            return Err(invalid(
                "tracker.command",
                format!("{:?}", raw.command),
                "Command arguments cannot be empty strings",
            ));
        }

        if raw.output_file.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "output_file",
                context: "tracker".to_string(),
            }
            .into());
        }

        Ok(TrackerConfig {
            command: raw.command,
            output_file: raw.output_file,
            stop_timeout: Duration::from_secs(raw.stop_timeout_secs.max(1)),
        })
    }

    fn validate_startup(raw: RawStartupConfig) -> EcoResult<StartupConfig> {
        if raw.repetitions == 0 {
            return Err(invalid("startup.repetitions", 0, "Must be at least 1"));
        }

        if raw.timeout_secs == 0 {
            return Err(invalid("startup.timeout_secs", 0, "Timeout must be greater than 0"));
        }

        Ok(StartupConfig {
            repetitions: raw.repetitions,
            timeout: Duration::from_secs(raw.timeout_secs),
            poll_interval: Duration::from_millis(raw.poll_interval_ms.max(10)),
            container_binary: raw.container_binary,
        })
    }

    fn validate_registry(
        raw_subjects: Vec<RawSubject>,
        raw_loads: Vec<u32>,
        raw_endpoints: Vec<RawEndpoint>,
    ) -> EcoResult<Registry> {
        let mut subjects = Vec::with_capacity(raw_subjects.len());
        let mut seen_ids = HashSet::new();
        let mut seen_ports = HashSet::new();

        for (index, raw) in raw_subjects.into_iter().enumerate() {
            let id = SubjectId::new(&raw.id).map_err(|mut e| {
                if let HardValidationError::InvalidFieldValue { ref mut field, .. } = e {
                    *field = "id";
                }
                e
            })?;

            if !seen_ids.insert(id.as_str().to_ascii_lowercase()) {
                return Err(HardValidationError::DuplicateSubjectId { id: id.to_string() }.into());
            }

            let port = Port::new(raw.port)?;
            if !seen_ports.insert((raw.host.clone(), port.value())) {
                return Err(HardValidationError::InvalidPort {
                    port: port.value(),
                    reason: format!("Port {} is already used by another subject", port),
                }
                .into());
            }

            if raw.host.is_empty() {
                return Err(HardValidationError::MissingRequiredField {
                    field: "host",
                    context: format!("subject at index {}", index),
                }
                .into());
            }

            let name = raw.name.unwrap_or_else(|| id.to_string());
            let container = raw
                .container
                .unwrap_or_else(|| format!("{}-carbon-test", id));

            subjects.push(Subject {
                id,
                name,
                host: raw.host,
                port,
                container,
            });
        }

        if subjects.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one subject must be defined".to_string(),
            }
            .into());
        }

        let mut loads = Vec::with_capacity(raw_loads.len());
        for raw in raw_loads {
            let load = LoadSize::new(raw)?;
            if !loads.contains(&load) {
                loads.push(load);
            }
        }

        if loads.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one load size must be defined".to_string(),
            }
            .into());
        }

        let mut endpoints: Vec<Endpoint> = Vec::with_capacity(raw_endpoints.len());
        for raw in raw_endpoints {
            if raw.name.is_empty() {
                return Err(HardValidationError::MissingRequiredField {
                    field: "name",
                    context: format!("endpoint '{}'", raw.path),
                }
                .into());
            }
            if !raw.path.starts_with('/') {
                return Err(invalid("endpoint.path", &raw.path, "Path must start with '/'"));
            }
            if endpoints.iter().any(|e| e.name == raw.name) {
                return Err(HardValidationError::SchemaValidation {
                    message: format!("Duplicate endpoint name: {}", raw.name),
                }
                .into());
            }
            endpoints.push(Endpoint {
                name: raw.name,
                path: raw.path,
            });
        }

        if endpoints.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one endpoint must be defined".to_string(),
            }
            .into());
        }

        Ok(Registry {
            subjects,
            loads,
            endpoints,
        })
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: &str) -> EcoError {
    HardValidationError::InvalidFieldValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
settings:
  results_dir: /tmp/ecobench
  inter_test_delay_secs: 1
  min_duration_secs: 15

subjects:
  - id: fastapi
    name: FastAPI
    port: 8000
  - id: gin
    port: 8004
    container: gin-container

loads: [100, 1000]

endpoints:
  - name: light
    path: /api/v1/weather/analytics/light
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.registry.subjects.len(), 2);
        assert_eq!(config.registry.subjects[0].name, "FastAPI");
        assert_eq!(config.registry.subjects[1].name, "gin");
        assert_eq!(config.registry.subjects[1].container, "gin-container");
        assert_eq!(config.registry.subjects[0].container, "fastapi-carbon-test");
        assert_eq!(config.settings.min_duration, Some(Duration::from_secs(15)));
        assert!(!config.tracker.is_enabled());
    }

    #[test]
    fn test_builtin_registry() {
        let config = ConfigLoader::builtin().unwrap();
        assert_eq!(config.registry.subjects.len(), 6);
        assert_eq!(config.registry.loads.len(), 3);
        assert_eq!(config.registry.endpoints.len(), 3);
        assert!(config.tracker.is_enabled());

        let django = config.registry.subject("django").unwrap();
        assert_eq!(django.base_url(), "http://localhost:8001");
    }

    #[test]
    fn test_lookup_unknown_subject() {
        let config = ConfigLoader::builtin().unwrap();
        assert!(matches!(
            config.registry.subject("rails"),
            Err(EcoError::SubjectNotFound(_))
        ));
        assert!(config.registry.endpoint("extreme").is_err());
    }

    #[test]
    fn test_missing_subjects() {
        let yaml = r#"
subjects: []
endpoints:
  - name: light
    path: /light
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_duplicate_ports() {
        let yaml = r#"
subjects:
  - id: a
    port: 8000
  - id: b
    port: 8000
endpoints:
  - name: light
    path: /light
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_duplicate_ids() {
        let yaml = r#"
subjects:
  - id: a
    port: 8000
  - id: A
    port: 8001
endpoints:
  - name: light
    path: /light
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_zero_load_rejected() {
        let yaml = r#"
subjects:
  - id: a
    port: 8000
loads: [0]
endpoints:
  - name: light
    path: /light
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_negative_min_duration_rejected() {
        let yaml = r#"
settings:
  min_duration_secs: -3
subjects:
  - id: a
    port: 8000
endpoints:
  - name: light
    path: /light
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
subjects:
  - id: a
    port: 8000
endpoints:
  - name: light
    path: /light
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(config.settings.request_timeout, Duration::from_secs(30));
        assert_eq!(config.settings.concurrency_threshold, 100);
        assert_eq!(config.settings.monitor_interval, Duration::from_secs(1));
        assert_eq!(config.startup.repetitions, 3);
        assert_eq!(config.registry.loads.len(), 3);
    }
}
