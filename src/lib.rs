//! FAERS Decode Library
//!
//! Converts the quarterly FAERS ASCII extracts (`$`-delimited, latin-1)
//! into UTF-8 CSV files, one per table.
//!
//! This library provides tools for:
//! - Discovering allow-listed table files in an unpacked extract tree
//! - Pre-flight validation of each file before it is read
//! - Streaming large files in bounded row chunks
//! - Dropping empty columns, filling missing cells and trimming whitespace
//! - Atomic write-to-temp-then-rename output
//! - Bounded retries with linear backoff and a parallel worker pool
//! - A JSON run report and a failed-task list that can seed a retry run

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod processor;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{ConvertConfig, EmptyColumnPolicy, TextEncoding};
pub use error::{Error, Result};
pub use models::{ConversionResult, ReadMode, Report, RunCounts, Task, TaskStatus};
pub use processor::BatchConverter;
