// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! ecobench CLI
//!
//! Runs benchmark suites against the configured services and analyses the
//! persisted results.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod console;
mod report;

/// ecobench - energy, latency and throughput comparison of equivalent services
#[derive(Parser)]
#[command(name = "ecobench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (built-in registry when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Results directory, overriding the configured one
    #[arg(short, long, global = true)]
    pub results: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Benchmark one subject/load/endpoint configuration
    Run {
        /// Subject id, e.g. gin
        subject: String,

        /// Number of requests
        #[arg(default_value_t = 100)]
        load: u32,

        /// Endpoint name
        #[arg(default_value = "light")]
        endpoint: String,

        /// Independent repetitions
        #[arg(short = 'n', long, default_value_t = 1)]
        runs: u32,

        /// Pad the tracked window to at least this many seconds
        #[arg(long)]
        min_duration: Option<f64>,
    },

    /// Benchmark the full subject × load × endpoint matrix
    Suite {
        /// Independent repetitions per configuration, scheduled round-robin
        #[arg(short = 'n', long, default_value_t = 1)]
        runs: u32,

        /// Restrict to these subjects
        #[arg(long, value_delimiter = ',')]
        subjects: Vec<String>,

        /// Restrict to these loads
        #[arg(long, value_delimiter = ',')]
        loads: Vec<u32>,

        /// Restrict to these endpoints
        #[arg(long, value_delimiter = ',')]
        endpoints: Vec<String>,

        /// Pad every tracked window to at least this many seconds
        #[arg(long)]
        min_duration: Option<f64>,
    },

    /// Measure container cold-start time
    Startup {
        /// Only this subject
        subject: Option<String>,

        /// Stop/start cycles per subject
        #[arg(long)]
        repetitions: Option<u32>,
    },

    /// Analyse persisted results and write the Markdown report
    Analyze {
        /// Report path (defaults to REPORT.md in the results directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the statistical analysis as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List configured subjects, loads and endpoints
    List,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.config.as_deref();
    let results = cli.results.as_deref();

    match cli.command {
        Commands::Run {
            subject,
            load,
            endpoint,
            runs,
            min_duration,
        } => {
            commands::run::execute(
                config,
                results,
                &subject,
                load,
                &endpoint,
                runs,
                min_duration,
            )
            .await
        }
        Commands::Suite {
            runs,
            subjects,
            loads,
            endpoints,
            min_duration,
        } => {
            commands::suite::execute(
                config,
                results,
                runs,
                &subjects,
                &loads,
                &endpoints,
                min_duration,
            )
            .await
        }
        Commands::Startup {
            subject,
            repetitions,
        } => commands::startup::execute(config, results, subject.as_deref(), repetitions).await,
        Commands::Analyze { output, json } => {
            commands::analyze::execute(config, results, output, json).await
        }
        Commands::List => commands::list::execute(config).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
