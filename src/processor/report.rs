//! Run report and failed-task list
//!
//! Both artefacts list results sorted by (year, quarter, stem). The failed
//! list doubles as input to a later run restricted to those tasks.

use crate::config::ConvertConfig;
use crate::error::{Error, Result};
use crate::models::{ConversionResult, Report, RunCounts};
use crate::processor::discovery::TaskKey;

use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Assemble the report; results are sorted in place
pub fn build_report(
    config: &ConvertConfig,
    run_ts: &str,
    run_dir: PathBuf,
    workers: usize,
    elapsed: Duration,
    mut results: Vec<ConversionResult>,
) -> Report {
    results.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    Report {
        run_ts: run_ts.to_string(),
        input_root: config.input_root.clone(),
        output_root: config.output_root.clone(),
        run_dir,
        workers,
        max_retries: config.max_retries,
        skip_existing: config.skip_existing,
        chunk_threshold_mb: config.chunk_threshold_mb,
        chunk_rows: config.chunk_rows,
        elapsed_sec: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
        counts: RunCounts::from_results(&results),
        results,
    }
}

/// Write the report as pretty-printed JSON
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut out, report)?;
    out.write_all(b"\n")?;
    out.flush()?;
    info!("Report written: {}", path.display());
    Ok(())
}

/// Write the failed list; returns false (and writes nothing) without failures
pub fn write_failed_list(report: &Report, path: &Path) -> Result<bool> {
    if !report.has_failures() {
        return Ok(false);
    }

    let mut out = BufWriter::new(fs::File::create(path)?);
    for result in report.failures() {
        writeln!(out, "{}", result.failed_line())?;
    }
    out.flush()?;
    warn!(
        "{} failed tasks listed in {}",
        report.counts.fail,
        path.display()
    );
    Ok(true)
}

/// Read the task keys back out of a failed list
pub fn read_failed_list(path: &Path) -> Result<HashSet<TaskKey>> {
    let text = fs::read_to_string(path).map_err(|e| {
        Error::configuration(format!(
            "Cannot read failed list {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut keys = HashSet::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(year), Some(quarter), Some(stem)) => {
                keys.insert((year.to_string(), quarter.to_string(), stem.to_string()));
            }
            _ => warn!(
                "Ignoring malformed line {} in {}",
                number + 1,
                path.display()
            ),
        }
    }

    info!("Loaded {} task keys from {}", keys.len(), path.display());
    Ok(keys)
}
