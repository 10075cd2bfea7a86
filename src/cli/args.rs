//! Command-line argument definitions for the FAERS decoder
//!
//! Defines the CLI using the clap derive API and folds the parsed
//! options into a [`ConvertConfig`].

use crate::Result;
use crate::config::{ConvertConfig, EmptyColumnPolicy, TextEncoding};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing::level_filters::LevelFilter;

/// CLI arguments for the FAERS quarterly extract decoder
///
/// Converts `$`-delimited latin-1 FAERS ASCII tables into UTF-8 CSV files,
/// one per table, with retries, atomic writes and a per-run report.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "faers-decode",
    version,
    about = "Convert FAERS quarterly ASCII extracts to UTF-8 CSV",
    long_about = "Walks an unpacked FAERS extract tree ({year}/{Q1..Q4}/ascii/*.txt), \
                  converts every allow-listed table to CSV under {output}/{year}/{quarter}/, \
                  and records every task in a run report. Re-running skips outputs that \
                  already exist, so an interrupted run can simply be started again."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Convert every discovered table (main command)
    Convert(ConvertArgs),
    /// List the tables a conversion would process
    Discover(DiscoverArgs),
}

/// Options shared by every subcommand
#[derive(Debug, Clone, ClapArgs)]
pub struct CommonArgs {
    /// Root of the unpacked extracts
    ///
    /// Expected layout: {input}/{year}/{Q1..Q4}/ascii/*.txt
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input_path: Option<PathBuf>,

    /// Root receiving the converted CSV files
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// JSON configuration file; command-line options take precedence
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CommonArgs {
    /// Defaults, then the config file, then the path options
    pub fn load_config(&self) -> Result<ConvertConfig> {
        let mut config = match &self.config_file {
            Some(path) => {
                info!("Using config file: {}", path.display());
                ConvertConfig::from_file(path)?
            }
            None => ConvertConfig::default(),
        };

        if let Some(input) = &self.input_path {
            config.input_root = input.clone();
        }
        if let Some(output) = &self.output_path {
            config.output_root = output.clone();
        }
        Ok(config)
    }

    /// Log level implied by `-v`/`-q`
    pub fn get_log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::ERROR
        } else {
            match self.verbose {
                0 => LevelFilter::INFO,
                1 => LevelFilter::DEBUG,
                _ => LevelFilter::TRACE,
            }
        }
    }
}

/// Arguments for the convert command
#[derive(Debug, Clone, Parser)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory receiving run_{timestamp}/ log and report folders
    #[arg(long = "log-dir", value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// Number of parallel workers (default: min(CPU count, task count))
    #[arg(short = 'j', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Attempts per task, counting the first
    #[arg(long = "max-retries", value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Backoff base in seconds; retry n waits n * base
    #[arg(long = "backoff", value_name = "SECS")]
    pub backoff_secs: Option<f64>,

    /// Files at or above this size (MiB) are read in chunks
    #[arg(long = "chunk-threshold-mb", value_name = "MB")]
    pub chunk_threshold_mb: Option<u64>,

    /// Rows per chunk in chunked mode
    #[arg(long = "chunk-rows", value_name = "ROWS")]
    pub chunk_rows: Option<usize>,

    /// Source text encoding
    #[arg(long = "encoding", value_enum)]
    pub encoding: Option<TextEncoding>,

    /// Source field delimiter
    #[arg(long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// How empty columns are detected when reading in chunks
    #[arg(long = "empty-column-policy", value_enum)]
    pub empty_column_policy: Option<EmptyColumnPolicy>,

    /// Re-convert even when the output already exists
    #[arg(long = "force")]
    pub force: bool,

    /// Only convert the tasks listed in a failed_files_*.txt from an earlier run
    #[arg(long = "failed-list", value_name = "FILE")]
    pub failed_list: Option<PathBuf>,

    /// Show what would be converted without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Hide the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl ConvertArgs {
    /// Build and validate the run configuration
    pub fn load_config(&self) -> Result<ConvertConfig> {
        let mut config = self.common.load_config()?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ConvertConfig) {
        if let Some(log_dir) = &self.log_dir {
            config.log_root = log_dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backoff) = self.backoff_secs {
            config.backoff_base_secs = backoff;
        }
        if let Some(threshold) = self.chunk_threshold_mb {
            config.chunk_threshold_mb = threshold;
        }
        if let Some(rows) = self.chunk_rows {
            config.chunk_rows = rows;
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(policy) = self.empty_column_policy {
            config.empty_column_policy = policy;
        }
        if self.force {
            config.skip_existing = false;
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.no_progress && !self.common.quiet
    }
}

/// Arguments for the discover command
#[derive(Debug, Clone, Parser)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output format for the task list
    #[arg(long = "format", value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

impl DiscoverArgs {
    pub fn load_config(&self) -> Result<ConvertConfig> {
        let config = self.common.load_config()?;
        config.validate()?;
        Ok(config)
    }
}

/// Output format options for machine-readable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}
