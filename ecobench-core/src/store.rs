// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Flat JSON result store.
//!
//! Each run is written once to its own pretty-printed file. Batch and
//! cold-start artifacts share the directory but carry reserved file-name
//! prefixes so the loader never counts a run twice.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::RunRecord;

/// Prefix of the combined artifact written at the end of a batch.
pub const BATCH_PREFIX: &str = "comparison_suite_";
/// Prefix of cold-start artifacts.
pub const STARTUP_PREFIX: &str = "startup_times_";

const RESERVED_PREFIXES: &[&str] = &[BATCH_PREFIX, STARTUP_PREFIX];

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Whether a file name belongs to an aggregate artifact rather than a run.
pub fn is_reserved(file_name: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|p| file_name.starts_with(p))
}

/// File name for an individual run record.
pub fn run_file_name(record: &RunRecord) -> String {
    let run = record
        .run_index
        .map(|n| format!("_run{}", n))
        .unwrap_or_default();
    format!(
        "{}_{}_{}{}_{}.json",
        record.subject,
        record.endpoint_name,
        record.load_size,
        run,
        record.timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Records loaded from a result directory.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<RunRecord>,
    /// Files read successfully.
    pub files: usize,
    /// Aggregate artifacts skipped by prefix.
    pub reserved: Vec<PathBuf>,
    /// Files that could not be read or parsed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadedRecords {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Directory-backed store of run records.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Open a store for reading. The directory need not exist.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Open a store for writing, creating the directory.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir).map_err(|source| StoreError::DirectoryCreation {
            path: store.dir.clone(),
            source,
        })?;
        Ok(store)
    }

    /// Persist one run record. Returns the written path.
    pub fn save_run(&self, record: &RunRecord) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(run_file_name(record));
        self.write_json(&path, record)?;
        debug!(path = %path.display(), "Saved run record");
        Ok(path)
    }

    /// Persist the combined artifact for a batch.
    pub fn save_batch(&self, records: &[RunRecord]) -> Result<PathBuf, StoreError> {
        self.save_prefixed(BATCH_PREFIX, records)
    }

    /// Persist cold-start results.
    pub fn save_startup<T: Serialize + ?Sized>(&self, summary: &T) -> Result<PathBuf, StoreError> {
        self.save_prefixed(STARTUP_PREFIX, summary)
    }

    fn save_prefixed<T: Serialize + ?Sized>(
        &self,
        prefix: &str,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        let filename = format!("{}{}.json", prefix, Utc::now().format(TIMESTAMP_FORMAT));
        let path = self.dir.join(filename);
        self.write_json(&path, value)?;
        Ok(path)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(write_err)?;
        Ok(())
    }

    /// Load every run record in the directory.
    ///
    /// Each file may hold a single record or an array of records. Reserved
    /// artifacts are skipped; unreadable files are logged and skipped. A
    /// missing directory yields an empty result.
    pub fn load_all(&self) -> Result<LoadedRecords, StoreError> {
        let mut loaded = LoadedRecords::default();
        if !self.dir.exists() {
            warn!(dir = %self.dir.display(), "Result directory does not exist");
            return Ok(loaded);
        }

        let scan_err = |source| StoreError::Scan {
            path: self.dir.clone(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(scan_err)? {
            let path = entry.map_err(scan_err)?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if is_reserved(name) {
                debug!(file = name, "Skipping aggregate artifact");
                loaded.reserved.push(path);
                continue;
            }

            match read_records(&path) {
                Ok(mut records) => {
                    loaded.files += 1;
                    loaded.records.append(&mut records);
                }
                Err(reason) => {
                    warn!(file = %path.display(), error = %reason, "Skipping unreadable result file");
                    loaded.failed.push((path, reason));
                }
            }
        }

        loaded.records.sort_by_key(|r| r.timestamp);
        Ok(loaded)
    }
}

fn read_records(path: &Path) -> Result<Vec<RunRecord>, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RunRecord>, _>>()
            .map_err(|e| e.to_string()),
        Value::Object(_) => serde_json::from_value(value)
            .map(|r| vec![r])
            .map_err(|e| e.to_string()),
        _ => Err("expected a JSON object or array".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::record;
    use tempfile::TempDir;

    #[test]
    fn test_run_file_name() {
        let mut r = record("fastapi", 100, "light");
        let name = run_file_name(&r);
        assert!(name.starts_with("fastapi_light_100_"));
        assert!(!name.contains("_run"));

        r.run_index = Some(2);
        assert!(run_file_name(&r).starts_with("fastapi_light_100_run2_"));
    }

    #[test]
    fn test_batch_not_double_counted() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::create(dir.path()).unwrap();

        let a = record("fastapi", 10, "light");
        let b = record("gin", 10, "light");
        store.save_run(&a).unwrap();
        store.save_run(&b).unwrap();
        let batch = store.save_batch(&[a.clone(), b.clone()]).unwrap();
        assert!(batch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(BATCH_PREFIX));

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.files, 2);
        assert_eq!(loaded.reserved.len(), 1);
    }

    #[test]
    fn test_startup_artifact_skipped() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::create(dir.path()).unwrap();
        store.save_startup(&serde_json::json!([{"subject": "gin"}])).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_array_file_and_bad_file() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("chi", 5, "heavy"), record("chi", 5, "medium")];
        fs::write(
            dir.path().join("legacy.json"),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = ResultStore::new(dir.path()).load_all().unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.failed.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = ResultStore::new(dir.path().join("nope")).load_all().unwrap();
        assert!(loaded.is_empty());
    }
}
