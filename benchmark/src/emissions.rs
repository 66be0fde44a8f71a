// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Emissions adapter.
//!
//! Wraps an external energy tracker that is started before the load phase,
//! stopped after it, and leaves a CSV telemetry table behind. Every failure
//! past this boundary is folded into the returned [`EmissionsReport`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use ecobench_core::{EmissionsReport, PowerMeasurement, Reliability, TrackerConfig};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const TEST_ID_PLACEHOLDER: &str = "{test_id}";

#[derive(Debug, Error)]
pub enum EmissionsError {
    #[error("Energy tracking is disabled (no tracker command configured)")]
    Disabled,

    #[error("Energy tracker was not started")]
    NotStarted,

    #[error("Failed to spawn energy tracker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to signal energy tracker: {0}")]
    Signal(#[from] nix::Error),

    #[error("Failed waiting for energy tracker: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Telemetry file not found: {path}")]
    TelemetryMissing { path: PathBuf },

    #[error("Failed to read telemetry file {path}: {source}")]
    TelemetryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed telemetry table: {0}")]
    TelemetryParse(String),
}

/// Start/stop black box that exports a telemetry table.
pub trait EnergyTracker: Send {
    fn start(&mut self, test_id: &str) -> impl Future<Output = Result<(), EmissionsError>> + Send;

    /// Stop tracking. Returns the path of the exported table.
    fn stop(&mut self) -> impl Future<Output = Result<PathBuf, EmissionsError>> + Send;
}

/// Tracker that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTracker;

impl EnergyTracker for DisabledTracker {
    async fn start(&mut self, _test_id: &str) -> Result<(), EmissionsError> {
        Err(EmissionsError::Disabled)
    }

    async fn stop(&mut self) -> Result<PathBuf, EmissionsError> {
        Err(EmissionsError::Disabled)
    }
}

/// Runs an external command for the duration of a measurement and
/// interrupts it with SIGINT to make it flush its table.
#[derive(Debug)]
pub struct CommandTracker {
    command: Vec<String>,
    output_file: String,
    working_dir: PathBuf,
    stop_timeout: Duration,
    child: Option<Child>,
    output_path: Option<PathBuf>,
}

impl CommandTracker {
    pub fn new(config: &TrackerConfig, working_dir: impl AsRef<Path>) -> Self {
        Self {
            command: config.command.clone(),
            output_file: config.output_file.clone(),
            working_dir: working_dir.as_ref().to_path_buf(),
            stop_timeout: config.stop_timeout,
            child: None,
            output_path: None,
        }
    }
}

impl EnergyTracker for CommandTracker {
    async fn start(&mut self, test_id: &str) -> Result<(), EmissionsError> {
        let (program, args) = self.command.split_first().ok_or(EmissionsError::Disabled)?;
        let args: Vec<String> = args
            .iter()
            .map(|a| a.replace(TEST_ID_PLACEHOLDER, test_id))
            .collect();

        let output_path = self
            .working_dir
            .join(self.output_file.replace(TEST_ID_PLACEHOLDER, test_id));
        // A table left over from an earlier run would be read as this one.
        if let Err(e) = tokio::fs::remove_file(&output_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %output_path.display(), error = %e, "Could not remove stale telemetry file");
            }
        }

        let child = Command::new(program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EmissionsError::Spawn {
                program: program.clone(),
                source,
            })?;

        debug!(program = %program, pid = ?child.id(), test_id, "Energy tracker started");
        self.child = Some(child);
        self.output_path = Some(output_path);
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf, EmissionsError> {
        let mut child = self.child.take().ok_or(EmissionsError::NotStarted)?;
        let output_path = self.output_path.take().ok_or(EmissionsError::NotStarted)?;

        if let Some(pid) = child.id() {
            kill(Pid::from_raw(pid as i32), Signal::SIGINT)?;
        }

        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(EmissionsError::Wait)?;
                debug!(%status, "Energy tracker exited");
            }
            Err(_) => {
                warn!(timeout = ?self.stop_timeout, "Energy tracker ignored SIGINT; killing");
                child.kill().await.map_err(EmissionsError::Wait)?;
            }
        }

        Ok(output_path)
    }
}

/// Either tracker, chosen from configuration.
#[derive(Debug)]
pub enum ConfiguredTracker {
    Command(CommandTracker),
    Disabled(DisabledTracker),
}

impl ConfiguredTracker {
    pub fn from_config(config: &TrackerConfig, working_dir: impl AsRef<Path>) -> Self {
        if config.is_enabled() {
            Self::Command(CommandTracker::new(config, working_dir))
        } else {
            Self::Disabled(DisabledTracker)
        }
    }
}

impl EnergyTracker for ConfiguredTracker {
    async fn start(&mut self, test_id: &str) -> Result<(), EmissionsError> {
        match self {
            Self::Command(t) => t.start(test_id).await,
            Self::Disabled(t) => t.start(test_id).await,
        }
    }

    async fn stop(&mut self) -> Result<PathBuf, EmissionsError> {
        match self {
            Self::Command(t) => t.stop().await,
            Self::Disabled(t) => t.stop().await,
        }
    }
}

/// Error-absorbing wrapper around a tracker.
pub struct EmissionsAdapter<T> {
    tracker: T,
    start_error: Option<String>,
}

impl<T: EnergyTracker> EmissionsAdapter<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            start_error: None,
        }
    }

    pub async fn start(&mut self, test_id: &str) {
        self.start_error = match self.tracker.start(test_id).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, test_id, "Energy tracker failed to start; emissions will be missing");
                Some(e.to_string())
            }
        };
    }

    /// Stop the tracker and parse its table. Never fails.
    pub async fn stop(&mut self) -> EmissionsReport {
        if let Some(error) = self.start_error.take() {
            return EmissionsReport::failed(error);
        }
        let result = match self.tracker.stop().await {
            Ok(path) => read_telemetry(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(report) => {
                info!(
                    emissions_kg = report.emissions_kg,
                    power = %report.power_measurement,
                    "Emissions captured"
                );
                report
            }
            Err(e) => {
                warn!(error = %e, "Emissions telemetry unavailable");
                EmissionsReport::failed(e.to_string())
            }
        }
    }
}

/// Read and parse an exported telemetry table.
pub async fn read_telemetry(path: &Path) -> Result<EmissionsReport, EmissionsError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EmissionsError::TelemetryMissing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(EmissionsError::TelemetryRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_telemetry(&content)
}

/// Extract an [`EmissionsReport`] from CSV telemetry. Values come from the
/// last row; the power classification looks at every row.
pub fn parse_telemetry(content: &str) -> Result<EmissionsReport, EmissionsError> {
    let table = CsvTable::parse(content)?;
    let last = table
        .rows
        .last()
        .ok_or_else(|| EmissionsError::TelemetryParse("table has no data rows".to_string()))?;

    let text = |column: &str| -> Option<String> {
        table
            .get(last, column)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let number = |column: &str| -> Option<f64> {
        table
            .get(last, column)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    let emissions_kg = number("emissions").ok_or_else(|| {
        EmissionsError::TelemetryParse("missing or non-numeric 'emissions' column".to_string())
    })?;

    Ok(EmissionsReport {
        emissions_kg,
        energy_consumed_kwh: number("energy_consumed").unwrap_or_default(),
        cpu_power_w: number("cpu_power").unwrap_or_default(),
        gpu_power_w: number("gpu_power").unwrap_or_default(),
        ram_power_w: number("ram_power").unwrap_or_default(),
        cpu_energy_kwh: number("cpu_energy").unwrap_or_default(),
        gpu_energy_kwh: number("gpu_energy").unwrap_or_default(),
        ram_energy_kwh: number("ram_energy").unwrap_or_default(),
        cpu_model: text("cpu_model"),
        gpu_model: text("gpu_model"),
        cpu_count: number("cpu_count").map(|v| v as u32),
        ram_total_size_gb: number("ram_total_size"),
        tracking_mode: text("tracking_mode"),
        tracker_duration_secs: number("duration"),
        sample_rows: table.rows.len(),
        power_measurement: classify_power(&table),
        reliability: None,
        error: None,
    })
}

/// Identical CPU power on every row means the tracker fell back to a TDP
/// estimate.
fn classify_power(table: &CsvTable) -> PowerMeasurement {
    let values: Vec<f64> = table
        .rows
        .iter()
        .filter_map(|row| table.get(row, "cpu_power"))
        .filter_map(|s| s.trim().parse::<f64>().ok())
        .collect();

    let Some(first) = values.first() else {
        return PowerMeasurement::Unknown;
    };
    if values.iter().all(|v| (v - first).abs() < 1e-9) {
        PowerMeasurement::Constant
    } else {
        PowerMeasurement::Variable
    }
}

/// Minimal header-indexed CSV reader with RFC 4180 quoting.
struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn parse(content: &str) -> Result<Self, EmissionsError> {
        let mut records = split_records(content)?.into_iter();
        let headers: Vec<String> = records
            .next()
            .ok_or_else(|| EmissionsError::TelemetryParse("empty table".to_string()))?
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = records
            .filter(|r| !(r.len() == 1 && r[0].trim().is_empty()))
            .collect();
        Ok(Self { headers, rows })
    }

    fn get<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == column)?;
        row.get(index).map(String::as_str)
    }
}

fn split_records(content: &str) -> Result<Vec<Vec<String>>, EmissionsError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err(EmissionsError::TelemetryParse(
            "unterminated quoted field".to_string(),
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Reliability for a finished measurement: the adapter's own classification
/// of the tracked window, or unknown when telemetry is missing.
pub fn nested_reliability(report: &EmissionsReport, tracked_secs: f64) -> Reliability {
    if report.is_ok() {
        Reliability::from_duration(tracked_secs)
    } else {
        Reliability::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,project_name,duration,emissions,emissions_rate,cpu_power,gpu_power,ram_power,cpu_energy,gpu_energy,ram_energy,energy_consumed,cpu_count,cpu_model,gpu_model,ram_total_size,tracking_mode";

    fn table(rows: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s.push('\n');
        s
    }

    #[test]
    fn test_constant_power_is_tdp_estimate() {
        let csv = table(&[
            "2025-01-01T00:00:00,t,10.0,0.00001,1e-6,42.5,0,3.0,0.0001,0,0.00001,0.00011,8,\"Intel(R) Core(TM) i7, 8 cores\",,15.5,machine",
            "2025-01-01T00:00:15,t,25.0,0.00003,1e-6,42.5,0,3.0,0.0003,0,0.00002,0.00032,8,\"Intel(R) Core(TM) i7, 8 cores\",,15.5,machine",
        ]);
        let report = parse_telemetry(&csv).unwrap();
        assert_eq!(report.power_measurement, PowerMeasurement::Constant);
        assert_eq!(report.emissions_kg, 0.00003);
        assert_eq!(report.energy_consumed_kwh, 0.00032);
        assert_eq!(report.tracker_duration_secs, Some(25.0));
        assert_eq!(report.cpu_model.as_deref(), Some("Intel(R) Core(TM) i7, 8 cores"));
        assert!(report.gpu_model.is_none());
        assert_eq!(report.cpu_count, Some(8));
        assert_eq!(report.tracking_mode.as_deref(), Some("machine"));
        assert_eq!(report.sample_rows, 2);
    }

    #[test]
    fn test_varying_power_is_measured() {
        let csv = table(&[
            "a,t,10,0.1,0,12.1,0,3,0,0,0,0.2,4,cpu,,8,process",
            "b,t,20,0.2,0,18.7,0,3,0,0,0,0.4,4,cpu,,8,process",
        ]);
        let report = parse_telemetry(&csv).unwrap();
        assert_eq!(report.power_measurement, PowerMeasurement::Variable);
        assert_eq!(report.cpu_power_w, 18.7);
    }

    #[test]
    fn test_header_only_table_is_error() {
        assert!(matches!(
            parse_telemetry(&table(&[])),
            Err(EmissionsError::TelemetryParse(_))
        ));
        assert!(parse_telemetry("").is_err());
    }

    #[test]
    fn test_quoted_fields() {
        let records = split_records("a,\"b,c\",\"say \"\"hi\"\"\"\r\n1,2,3").unwrap();
        assert_eq!(records[0], vec!["a", "b,c", "say \"hi\""]);
        assert_eq!(records[1], vec!["1", "2", "3"]);
        assert!(split_records("\"open").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_yields_failed_report() {
        let dir = TempDir::new().unwrap();
        let err = read_telemetry(&dir.path().join("emissions.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionsError::TelemetryMissing { .. }));
    }

    #[tokio::test]
    async fn test_disabled_tracker_reports_unknown() {
        let mut adapter = EmissionsAdapter::new(DisabledTracker);
        adapter.start("gin_light_100").await;
        let report = adapter.stop().await;
        assert!(!report.is_ok());
        assert_eq!(report.reliability, Some(Reliability::Unknown));
        assert_eq!(nested_reliability(&report, 30.0), Reliability::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_tracker_flushes_on_sigint() {
        let dir = TempDir::new().unwrap();
        let row = "x,t,20,0.5,0,10,0,2,0,0,0,0.9,2,cpu,,4,machine";
        let script = format!(
            "trap 'printf \"%s\\n%s\\n\" \"{}\" \"{}\" > {{test_id}}.csv; exit 0' INT; while :; do sleep 0.05; done",
            HEADER, row
        );
        let config = TrackerConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script],
            output_file: "{test_id}.csv".to_string(),
            stop_timeout: Duration::from_secs(5),
        };

        let mut adapter = EmissionsAdapter::new(ConfiguredTracker::from_config(&config, dir.path()));
        adapter.start("chi_heavy_100").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let report = adapter.stop().await;

        assert!(report.is_ok(), "unexpected error: {:?}", report.error);
        assert_eq!(report.emissions_kg, 0.5);
        assert!(dir.path().join("chi_heavy_100.csv").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_tracker_killed_after_timeout() {
        let dir = TempDir::new().unwrap();
        let config = TrackerConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "trap '' INT; while :; do sleep 0.05; done".to_string(),
            ],
            output_file: "never.csv".to_string(),
            stop_timeout: Duration::from_millis(200),
        };

        let mut adapter = EmissionsAdapter::new(CommandTracker::new(&config, dir.path()));
        adapter.start("x").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let started = std::time::Instant::now();
        let report = adapter.stop().await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(report.error.unwrap().contains("not found"));
    }
}
