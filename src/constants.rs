//! Application constants for the FAERS decoder
//!
//! Default values, directory layout names and reason codes shared by
//! discovery, conversion and reporting.

// =============================================================================
// Input Layout
// =============================================================================

/// FAERS table families kept by discovery (first four characters of the stem)
pub const TABLE_PREFIXES: &[&str] = &[
    "DEMO", "DRUG", "INDI", "OUTC", "REAC", "RPSR", "STAT", "THER",
];

/// Quarter directory names, in visiting order
pub const QUARTERS: &[&str] = &["Q1", "Q2", "Q3", "Q4"];

/// Name of the directory holding the ASCII extract inside a quarter
pub const ASCII_DIR_NAME: &str = "ascii";

/// Extensions recognised as data files by default
pub const DEFAULT_DATA_EXTENSIONS: &[&str] = &["txt"];

/// Length of the table prefix compared against the allow-list
pub const TABLE_PREFIX_LEN: usize = 4;

/// Extension of every converted output file
pub const OUTPUT_EXTENSION: &str = "csv";

// =============================================================================
// Parsing
// =============================================================================

/// FAERS field delimiter
pub const DEFAULT_DELIMITER: char = '$';

/// Bytes sniffed by the validator when looking for the delimiter
pub const HEAD_SNIFF_BYTES: usize = 4096;

/// Files at or above this size (MiB) are read in chunks
pub const DEFAULT_CHUNK_THRESHOLD_MB: u64 = 300;

/// Maximum rows held in memory per chunk
pub const DEFAULT_CHUNK_ROWS: usize = 300_000;

// =============================================================================
// Retry Policy
// =============================================================================

/// Attempts per task, counting the first one
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff base; the n-th retry waits `n * base` seconds
pub const DEFAULT_BACKOFF_BASE_SECS: f64 = 2.0;

// =============================================================================
// Default Paths and Artefacts
// =============================================================================

pub const DEFAULT_INPUT_ROOT: &str = "FAERS_DATA/UNZIP_DATA";
pub const DEFAULT_OUTPUT_ROOT: &str = "FAERS_DATA/CSV_DATA";
pub const DEFAULT_LOG_ROOT: &str = "FAERS_DATA/LOGS/faers_decode";

/// Timestamp format used for run directories and artefact names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// =============================================================================
// Reason Codes
// =============================================================================

pub mod reasons {
    pub const OK: &str = "OK";
    pub const OUTPUT_EXISTS: &str = "OUTPUT_EXISTS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CANNOT_STAT: &str = "CANNOT_STAT";
    pub const EMPTY_FILE: &str = "EMPTY_FILE";
    pub const CANNOT_READ_HEAD: &str = "CANNOT_READ_HEAD";
    pub const NO_DELIM_IN_HEAD_WARN: &str = "NO_DELIM_IN_HEAD_WARN";
    pub const FAILED_AFTER_RETRIES: &str = "FAILED_AFTER_RETRIES";
    pub const WORKER_PANICKED: &str = "WORKER_PANICKED";
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Run completed but at least one task failed
pub const EXIT_TASKS_FAILED: i32 = 2;
