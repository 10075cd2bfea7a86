//! Batch conversion engine.
//!
//! Orchestrates a full run: discover tasks, dispatch them to the worker
//! pool, then assemble and persist the run report.

pub mod cleaner;
pub mod converter;
pub mod discovery;
pub mod dispatcher;
pub mod reader;
pub mod report;
pub mod table;
pub mod validator;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::converter::{ConversionPipeline, CsvPipeline};
use self::discovery::{TaskDiscovery, TaskKey};
use self::dispatcher::Dispatcher;
use self::report::{build_report, write_failed_list, write_report};

use crate::config::ConvertConfig;
use crate::constants::RUN_TIMESTAMP_FORMAT;
use crate::error::Result;
use crate::logging::{RunDirectory, WorkerLogs};
use crate::models::{ConversionResult, Report, Task};

use chrono::Local;
use colored::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

/// Main driver for converting a FAERS extract tree
pub struct BatchConverter {
    config: Arc<ConvertConfig>,
    run_dir: Option<RunDirectory>,
    pipeline: Arc<dyn ConversionPipeline>,
    only: Option<HashSet<TaskKey>>,
    show_progress: bool,
    worker_level: LevelFilter,
    year_count: usize,
}

impl BatchConverter {
    /// Create a converter; the configuration is validated here
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            run_dir: None,
            pipeline: Arc::new(CsvPipeline),
            only: None,
            show_progress: false,
            worker_level: LevelFilter::INFO,
            year_count: 0,
        })
    }

    /// Persist worker logs, report and failed list under `run_dir`
    pub fn with_run_directory(mut self, run_dir: RunDirectory) -> Self {
        self.run_dir = Some(run_dir);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ConversionPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Show the progress bar and step banners on stdout
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Only convert the given `(year, quarter, stem)` keys
    pub fn with_only(mut self, keys: HashSet<TaskKey>) -> Self {
        self.only = Some(keys);
        self
    }

    pub fn with_worker_level(mut self, level: LevelFilter) -> Self {
        self.worker_level = level;
        self
    }

    /// Year directories seen by the last discovery
    pub fn year_count(&self) -> usize {
        self.year_count
    }

    /// Discover tasks without converting anything
    pub async fn discover(&mut self) -> Result<Vec<Task>> {
        let mut discovery = TaskDiscovery::new(&self.config);
        if let Some(only) = &self.only {
            discovery = discovery.with_only(only.clone());
        }
        let tasks = discovery.discover_tasks().await?;
        self.year_count = discovery.year_count();
        Ok(tasks)
    }

    /// Main processing entry point
    pub async fn run(&mut self) -> Result<Report> {
        let start_time = Instant::now();
        self.announce(format!(
            "{}\n  {} {}\n  {} {}",
            "Starting FAERS conversion".bright_green().bold(),
            "Input:".bright_cyan(),
            self.config.input_root.display(),
            "Output:".bright_cyan(),
            self.config.output_root.display()
        ));

        // Step 1: Discover tasks
        self.announce(format!("\n{}", "Discovering tasks...".bright_yellow()));
        let tasks = self.discover().await?;
        self.announce(format!(
            "  {} {} tasks across {} years",
            "Found".bright_green(),
            tasks.len().to_string().bright_white().bold(),
            self.year_count.to_string().bright_white().bold()
        ));

        if tasks.is_empty() {
            warn!(
                "Nothing to do: no tasks under {}",
                self.config.input_root.display()
            );
            return Ok(self.assemble_report(0, start_time, Vec::new()));
        }

        // Step 2: Convert
        let workers = self.config.resolve_workers(tasks.len());
        self.announce(format!(
            "\n{} ({} workers)",
            "Converting files...".bright_yellow(),
            workers
        ));

        let mut dispatcher = Dispatcher::new(self.config.clone())
            .with_pipeline(self.pipeline.clone())
            .with_progress(self.show_progress);
        if let Some(run_dir) = &self.run_dir {
            dispatcher =
                dispatcher.with_worker_logs(WorkerLogs::new(run_dir.clone(), self.worker_level));
        }
        let results = dispatcher.dispatch(tasks).await?;

        // Step 3: Report
        let report = self.assemble_report(workers, start_time, results);

        if let Some(run_dir) = &self.run_dir {
            write_report(&report, &run_dir.report_path())?;
            write_failed_list(&report, &run_dir.failed_list_path())?;
        }

        info!(
            "Run complete: total={} ok={} skip={} fail={} elapsed={}s",
            report.counts.total,
            report.counts.ok,
            report.counts.skip,
            report.counts.fail,
            report.elapsed_sec
        );

        Ok(report)
    }

    fn assemble_report(
        &self,
        workers: usize,
        start_time: Instant,
        results: Vec<ConversionResult>,
    ) -> Report {
        let (run_ts, run_path) = match &self.run_dir {
            Some(run_dir) => (run_dir.run_ts().to_string(), run_dir.path().to_path_buf()),
            None => (
                Local::now().format(RUN_TIMESTAMP_FORMAT).to_string(),
                PathBuf::new(),
            ),
        };
        build_report(
            &self.config,
            &run_ts,
            run_path,
            workers,
            start_time.elapsed(),
            results,
        )
    }

    fn announce(&self, line: String) {
        if self.show_progress {
            println!("{}", line);
        }
    }
}
