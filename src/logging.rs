//! Run directory and log sinks.
//!
//! Every run gets its own `run_{timestamp}` directory holding the main
//! log, one log per worker, the failed list and the JSON report. The main
//! log is a global subscriber; worker logs are separate [`Dispatch`]es
//! that each worker installs for its own thread.

use crate::constants::RUN_TIMESTAMP_FORMAT;
use crate::error::{Error, Result};

use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Per-run artefact directory
#[derive(Debug, Clone)]
pub struct RunDirectory {
    run_ts: String,
    path: PathBuf,
}

impl RunDirectory {
    /// Create `{log_root}/run_{YYYYmmdd_HHMMSS}`
    pub fn create(log_root: &Path) -> Result<Self> {
        let run_ts = Local::now().format(RUN_TIMESTAMP_FORMAT).to_string();
        Self::create_with_timestamp(log_root, run_ts)
    }

    pub fn create_with_timestamp(log_root: &Path, run_ts: impl Into<String>) -> Result<Self> {
        let run_ts = run_ts.into();
        let path = log_root.join(format!("run_{}", run_ts));
        std::fs::create_dir_all(&path)?;
        Ok(Self { run_ts, path })
    }

    pub fn run_ts(&self) -> &str {
        &self.run_ts
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn main_log_path(&self) -> PathBuf {
        self.path.join(format!("main_{}.log", self.run_ts))
    }

    pub fn worker_log_path(&self, worker_id: usize) -> PathBuf {
        self.path.join(format!("worker-{}.log", worker_id))
    }

    pub fn failed_list_path(&self) -> PathBuf {
        self.path.join(format!("failed_files_{}.txt", self.run_ts))
    }

    pub fn report_path(&self) -> PathBuf {
        self.path.join(format!("report_{}.json", self.run_ts))
    }
}

/// Install the global subscriber: stderr, plus the main log file if given
pub fn setup_logging(level: LevelFilter, quiet: bool, main_log: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("faers_decode={}", level)));

    let file_layer = match main_log {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(File::create(path)?)),
        ),
        None => None,
    };

    let stderr_layer = if quiet {
        fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::configuration(format!("Failed to initialise logging: {}", e)))?;

    Ok(())
}

/// Factory for per-worker log sinks inside a run directory
#[derive(Debug, Clone)]
pub struct WorkerLogs {
    run_dir: RunDirectory,
    level: LevelFilter,
}

impl WorkerLogs {
    pub fn new(run_dir: RunDirectory, level: LevelFilter) -> Self {
        Self { run_dir, level }
    }

    /// Build the isolated subscriber for one worker
    pub fn dispatch_for(&self, worker_id: usize) -> Result<Dispatch> {
        let file = File::create(self.run_dir.worker_log_path(worker_id))?;
        let subscriber = fmt()
            .with_ansi(false)
            .with_target(false)
            .with_max_level(self.level)
            .with_writer(Mutex::new(file))
            .finish();
        Ok(Dispatch::new(subscriber))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_directory_layout() {
        let temp_dir = TempDir::new().unwrap();
        let run_dir =
            RunDirectory::create_with_timestamp(temp_dir.path(), "20240101_120000").unwrap();

        assert!(run_dir.path().is_dir());
        assert!(run_dir.path().ends_with("run_20240101_120000"));
        assert!(
            run_dir
                .main_log_path()
                .ends_with("main_20240101_120000.log")
        );
        assert!(run_dir.worker_log_path(3).ends_with("worker-3.log"));
        assert!(
            run_dir
                .failed_list_path()
                .ends_with("failed_files_20240101_120000.txt")
        );
        assert!(
            run_dir
                .report_path()
                .ends_with("report_20240101_120000.json")
        );
    }

    #[test]
    fn test_worker_dispatch_writes_its_own_file() {
        let temp_dir = TempDir::new().unwrap();
        let run_dir = RunDirectory::create_with_timestamp(temp_dir.path(), "ts").unwrap();
        let logs = WorkerLogs::new(run_dir.clone(), LevelFilter::INFO);

        let dispatch = logs.dispatch_for(0).unwrap();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("hello from worker zero");
            tracing::debug!("filtered out");
        });

        let text = std::fs::read_to_string(run_dir.worker_log_path(0)).unwrap();
        assert!(text.contains("hello from worker zero"));
        assert!(!text.contains("filtered out"));
    }
}
