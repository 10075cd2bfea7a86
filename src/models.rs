//! Core data structures for FAERS conversion runs.
//!
//! Defines conversion tasks, per-task results and the run report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One source file to convert into one output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Four-digit year directory, e.g. `2020`
    pub year: String,
    /// `Q1`..`Q4`
    pub quarter: String,
    /// File name without extension, e.g. `DEMO20Q1`
    pub stem: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl Task {
    /// Sort key shared by the report and the failed list
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.year, &self.quarter, &self.stem)
    }

    /// Short `year/quarter` label used in log lines
    pub fn label(&self) -> String {
        format!("{}/{}", self.year, self.quarter)
    }
}

/// Final status of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "SKIP")]
    Skip,
    #[serde(rename = "FAIL")]
    Fail,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Ok => "OK",
            TaskStatus::Skip => "SKIP",
            TaskStatus::Fail => "FAIL",
        };
        f.write_str(s)
    }
}

/// How the input was read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    Full,
    Chunked,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Full => f.write_str("full"),
            ReadMode::Chunked => f.write_str("chunked"),
        }
    }
}

/// Outcome of one task, produced by the retrying converter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub year: String,
    pub quarter: String,
    #[serde(rename = "file")]
    pub stem: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: TaskStatus,
    pub reason: String,
    pub attempts: u32,
    pub rows: usize,
    pub cols: usize,
    pub seconds: f64,
    pub mode: Option<ReadMode>,
}

impl ConversionResult {
    /// A failed result with no attempts recorded yet
    pub fn pending(task: &Task) -> Self {
        Self {
            year: task.year.clone(),
            quarter: task.quarter.clone(),
            stem: task.stem.clone(),
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            status: TaskStatus::Fail,
            reason: String::new(),
            attempts: 0,
            rows: 0,
            cols: 0,
            seconds: 0.0,
            mode: None,
        }
    }

    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.year, &self.quarter, &self.stem)
    }

    /// One line of the failed-task list
    pub fn failed_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.year,
            self.quarter,
            self.stem,
            self.reason,
            self.input_path.display()
        )
    }
}

/// Aggregate status counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub ok: usize,
    pub skip: usize,
    pub fail: usize,
}

impl RunCounts {
    pub fn from_results(results: &[ConversionResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Default::default()
            },
            |mut counts, r| {
                match r.status {
                    TaskStatus::Ok => counts.ok += 1,
                    TaskStatus::Skip => counts.skip += 1,
                    TaskStatus::Fail => counts.fail += 1,
                }
                counts
            },
        )
    }
}

/// Everything recorded about one run, written once at the end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_ts: String,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub run_dir: PathBuf,
    pub workers: usize,
    pub max_retries: u32,
    pub skip_existing: bool,
    pub chunk_threshold_mb: u64,
    pub chunk_rows: usize,
    pub elapsed_sec: f64,
    pub counts: RunCounts,
    /// Sorted by (year, quarter, stem)
    pub results: Vec<ConversionResult>,
}

impl Report {
    /// Failed results in report order
    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| r.status == TaskStatus::Fail)
    }

    pub fn has_failures(&self) -> bool {
        self.counts.fail > 0
    }
}
