// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod analyze;
pub mod list;
pub mod run;
pub mod startup;
pub mod suite;
pub mod validate;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use ecobench_core::{Config, ConfigLoader};

/// Load the configuration file, or the built-in registry when none is given,
/// and apply the results directory override.
pub fn load_config(path: Option<&Path>, results: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => ConfigLoader::load_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ConfigLoader::builtin().context("Built-in configuration is invalid")?,
    };
    if let Some(dir) = results {
        config.settings.results_dir = dir.to_path_buf();
    }
    Ok(config)
}

/// `--min-duration` in seconds.
pub fn min_duration(secs: Option<f64>) -> anyhow::Result<Option<Duration>> {
    match secs {
        None => Ok(None),
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Duration::from_secs_f64(s))),
        Some(s) => bail!("--min-duration must be a positive number of seconds, got {s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_override() {
        let config = load_config(None, Some(Path::new("/tmp/ecobench-results"))).unwrap();
        assert_eq!(config.settings.results_dir, Path::new("/tmp/ecobench-results"));
        assert_eq!(config.registry.subjects.len(), 6);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/ecobench.yaml")), None).is_err());
    }

    #[test]
    fn test_min_duration_validation() {
        assert_eq!(min_duration(None).unwrap(), None);
        assert_eq!(
            min_duration(Some(1.5)).unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert!(min_duration(Some(0.0)).is_err());
        assert!(min_duration(Some(f64::NAN)).is_err());
    }
}
