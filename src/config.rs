//! Configuration management and validation.
//!
//! A [`ConvertConfig`] is built once at startup (defaults, then an optional
//! JSON file, then CLI overrides), validated, and handed by reference to
//! discovery, the converter and the dispatcher.

use crate::constants::{
    DEFAULT_BACKOFF_BASE_SECS, DEFAULT_CHUNK_ROWS, DEFAULT_CHUNK_THRESHOLD_MB,
    DEFAULT_DATA_EXTENSIONS, DEFAULT_DELIMITER, DEFAULT_INPUT_ROOT, DEFAULT_LOG_ROOT,
    DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT_ROOT, TABLE_PREFIXES, TABLE_PREFIX_LEN,
};
use crate::error::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Text encoding of the source extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// ISO-8859-1; every byte maps to exactly one char
    Latin1,
    /// UTF-8 with invalid sequences replaced by U+FFFD
    Utf8,
}

impl TextEncoding {
    /// Decode one raw field
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// How the cleaner decides that a column is empty when reading in chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyColumnPolicy {
    /// Emptiness is judged inside each chunk; a column can vanish from
    /// one chunk and be realigned as blanks by the writer
    PerChunk,
    /// Emptiness is judged over the whole file in a pre-pass, so chunked
    /// and full reads produce the same columns
    Global,
}

/// Run configuration for a conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Root holding `{year}/{quarter}/ascii/*.txt`
    pub input_root: PathBuf,

    /// Root receiving `{year}/{quarter}/{stem}.csv`
    pub output_root: PathBuf,

    /// Root under which a `run_{timestamp}` directory is created
    pub log_root: PathBuf,

    /// Treat an existing non-empty output as done
    pub skip_existing: bool,

    /// Worker count; `None` = min(cpu count, task count)
    pub workers: Option<usize>,

    /// Attempts per task, counting the first one
    pub max_retries: u32,

    /// Linear backoff base in seconds
    pub backoff_base_secs: f64,

    /// Size (MiB) at which a file is read in chunks
    pub chunk_threshold_mb: u64,

    /// Rows per chunk in chunked mode
    pub chunk_rows: usize,

    pub encoding: TextEncoding,

    /// Single ASCII field delimiter
    pub delimiter: char,

    /// Allow-listed table prefixes (4 characters, case-insensitive)
    pub table_prefixes: Vec<String>,

    /// Recognised data file extensions, without the dot
    pub data_extensions: Vec<String>,

    pub drop_empty_columns: bool,
    pub strip_whitespace: bool,
    pub fill_missing: bool,

    pub empty_column_policy: EmptyColumnPolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from(DEFAULT_INPUT_ROOT),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            log_root: PathBuf::from(DEFAULT_LOG_ROOT),
            skip_existing: true,
            workers: None,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            chunk_threshold_mb: DEFAULT_CHUNK_THRESHOLD_MB,
            chunk_rows: DEFAULT_CHUNK_ROWS,
            encoding: TextEncoding::Latin1,
            delimiter: DEFAULT_DELIMITER,
            table_prefixes: TABLE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            data_extensions: DEFAULT_DATA_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            drop_empty_columns: true,
            strip_whitespace: true,
            fill_missing: true,
            empty_column_policy: EmptyColumnPolicy::Global,
        }
    }
}

impl ConvertConfig {
    /// Create configuration rooted at the given input and output paths
    pub fn new(input_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            input_root,
            output_root,
            ..Default::default()
        }
    }

    /// Load a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::configuration(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration file: {}", path.display());
        Ok(config)
    }

    pub fn with_log_root(mut self, log_root: PathBuf) -> Self {
        self.log_root = log_root;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base_secs(mut self, secs: f64) -> Self {
        self.backoff_base_secs = secs;
        self
    }

    pub fn with_chunking(mut self, threshold_mb: u64, chunk_rows: usize) -> Self {
        self.chunk_threshold_mb = threshold_mb;
        self.chunk_rows = chunk_rows;
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_empty_column_policy(mut self, policy: EmptyColumnPolicy) -> Self {
        self.empty_column_policy = policy;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::configuration("max_retries must be at least 1"));
        }
        if self.chunk_rows == 0 {
            return Err(Error::configuration("chunk_rows must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(Error::configuration("workers must be at least 1"));
        }
        if !self.backoff_base_secs.is_finite() || self.backoff_base_secs < 0.0 {
            return Err(Error::configuration(format!(
                "backoff_base_secs must be a non-negative number, got {}",
                self.backoff_base_secs
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(Error::configuration(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )));
        }
        if self.table_prefixes.is_empty() {
            return Err(Error::configuration("table_prefixes must not be empty"));
        }
        if let Some(bad) = self
            .table_prefixes
            .iter()
            .find(|p| p.chars().count() != TABLE_PREFIX_LEN)
        {
            return Err(Error::configuration(format!(
                "table prefix {:?} must be exactly {} characters",
                bad, TABLE_PREFIX_LEN
            )));
        }
        if self.data_extensions.is_empty() {
            return Err(Error::configuration("data_extensions must not be empty"));
        }
        Ok(())
    }

    /// Delimiter as the byte handed to the CSV reader
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }

    /// Chunk threshold in bytes
    pub fn chunk_threshold_bytes(&self) -> u64 {
        self.chunk_threshold_mb.saturating_mul(1024 * 1024)
    }

    /// Sleep before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs * attempt as f64)
    }

    /// Whether a stem's prefix is on the allow-list
    pub fn is_allowed_table(&self, stem: &str) -> bool {
        let prefix: String = stem
            .chars()
            .take(TABLE_PREFIX_LEN)
            .collect::<String>()
            .to_uppercase();
        prefix.chars().count() == TABLE_PREFIX_LEN
            && self
                .table_prefixes
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&prefix))
    }

    /// Resolve the worker count for a given number of tasks
    pub fn resolve_workers(&self, task_count: usize) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => num_cpus::get().min(task_count).max(1),
        }
    }
}
