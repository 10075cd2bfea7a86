//! Retrying per-task converter
//!
//! One task moves through validate → read → clean → write. Validation
//! failures end the task at once; anything that goes wrong afterwards
//! (errors and panics alike) is retried with linear backoff until the
//! attempt budget is spent.

use crate::config::{ConvertConfig, EmptyColumnPolicy};
use crate::constants::reasons;
use crate::error::{Error, Result};
use crate::models::{ConversionResult, ReadMode, Task, TaskStatus};
use crate::processor::cleaner::{ColumnProfile, RowCleaner};
use crate::processor::reader::{ChunkReader, read_full};
use crate::processor::validator::{Validation, validate_file};
use crate::processor::writer::{AtomicCsvWriter, WriteStats};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The read → clean → write stage of a conversion
pub trait ConversionPipeline: Send + Sync {
    fn run(&self, task: &Task, mode: ReadMode, config: &ConvertConfig) -> Result<WriteStats>;
}

impl<T: ConversionPipeline + ?Sized> ConversionPipeline for std::sync::Arc<T> {
    fn run(&self, task: &Task, mode: ReadMode, config: &ConvertConfig) -> Result<WriteStats> {
        (**self).run(task, mode, config)
    }
}

/// Pipeline writing cleaned CSV through [`AtomicCsvWriter`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPipeline;

impl ConversionPipeline for CsvPipeline {
    fn run(&self, task: &Task, mode: ReadMode, config: &ConvertConfig) -> Result<WriteStats> {
        let cleaner = RowCleaner::from_config(config);
        match mode {
            ReadMode::Full => {
                let table = cleaner.clean(read_full(&task.input_path, config)?);
                let mut writer = AtomicCsvWriter::create(&task.output_path)?;
                writer.write_table(table)?;
                writer.finish()
            }
            ReadMode::Chunked => convert_chunked(task, config, &cleaner),
        }
    }
}

fn convert_chunked(task: &Task, config: &ConvertConfig, cleaner: &RowCleaner) -> Result<WriteStats> {
    let global = match config.empty_column_policy {
        EmptyColumnPolicy::Global if config.drop_empty_columns => {
            Some(profile_file(&task.input_path, config, cleaner)?)
        }
        _ => None,
    };

    let mut chunks = ChunkReader::open(&task.input_path, config)?;
    let header = chunks.columns().to_vec();
    let mut writer = AtomicCsvWriter::create(&task.output_path)?;

    for chunk in &mut chunks {
        let chunk = chunk?;
        let cleaned = match &global {
            Some(profile) => cleaner.clean_with_profile(chunk, profile),
            None => cleaner.clean(chunk),
        };
        writer.write_table(cleaned)?;
    }

    if !writer.has_header() {
        let columns = match &global {
            Some(profile) => profile.kept_columns(&header),
            None => header,
        };
        writer.ensure_header(&columns)?;
    }

    if chunks.skipped_lines() > 0 {
        warn!(
            "Skipped {} malformed lines in {}",
            chunks.skipped_lines(),
            task.input_path.display()
        );
    }
    debug!(
        "Read {} rows from {} in chunks",
        chunks.rows_read(),
        task.input_path.display()
    );
    writer.finish()
}

/// First pass over a file: which columns are non-empty anywhere
fn profile_file(path: &Path, config: &ConvertConfig, cleaner: &RowCleaner) -> Result<ColumnProfile> {
    let mut chunks = ChunkReader::open(path, config)?;
    let mut profile = ColumnProfile::new(chunks.columns().len());
    for chunk in &mut chunks {
        profile.observe(&chunk?, cleaner);
    }
    Ok(profile)
}

/// Validates, converts and retries one task at a time
pub struct RetryingConverter<'a, P: ConversionPipeline = CsvPipeline> {
    config: &'a ConvertConfig,
    pipeline: P,
}

impl<'a> RetryingConverter<'a, CsvPipeline> {
    pub fn new(config: &'a ConvertConfig) -> Self {
        Self {
            config,
            pipeline: CsvPipeline,
        }
    }
}

impl<'a, P: ConversionPipeline> RetryingConverter<'a, P> {
    pub fn with_pipeline(config: &'a ConvertConfig, pipeline: P) -> Self {
        Self { config, pipeline }
    }

    /// Convert one task; never returns an error, only a result
    pub fn convert(&self, task: &Task) -> ConversionResult {
        let mut result = ConversionResult::pending(task);
        let label = task.label();

        if self.config.skip_existing && output_exists(&task.output_path) {
            result.status = TaskStatus::Skip;
            result.reason = reasons::OUTPUT_EXISTS.to_string();
            return result;
        }

        let size = match validate_file(&task.input_path, self.config.delimiter_byte()) {
            Validation::Ok { size } => size,
            Validation::NoDelimiterInHead { size } => {
                warn!(
                    "[{}] Precheck warn(no '{}' in head): {} | reason={} | path={}",
                    label,
                    self.config.delimiter,
                    task.stem,
                    reasons::NO_DELIM_IN_HEAD_WARN,
                    task.input_path.display()
                );
                size
            }
            Validation::Rejected(rejection) => {
                result.reason = rejection.code().to_string();
                error!(
                    "[{}] Precheck failed: {} | reason={} | path={}",
                    label,
                    task.stem,
                    result.reason,
                    task.input_path.display()
                );
                return result;
            }
        };

        let size_mb = size as f64 / (1024.0 * 1024.0);
        let mode = if size >= self.config.chunk_threshold_bytes() {
            ReadMode::Chunked
        } else {
            ReadMode::Full
        };

        for attempt in 1..=self.config.max_retries {
            result.attempts = attempt;
            let start = Instant::now();
            info!(
                "[{}] Start {} | attempt={} | {:.1}MB | mode={}",
                label, task.stem, attempt, size_mb, mode
            );

            match self.run_guarded(task, mode) {
                Ok(stats) => {
                    result.status = TaskStatus::Ok;
                    result.reason = reasons::OK.to_string();
                    result.rows = stats.rows;
                    result.cols = stats.cols;
                    result.mode = Some(mode);
                    result.seconds = round_secs(start.elapsed().as_secs_f64());
                    info!(
                        "[{}] OK {} | rows={} cols={} sec={}",
                        label, task.stem, result.rows, result.cols, result.seconds
                    );
                    return result;
                }
                Err(e) => {
                    result.seconds = round_secs(start.elapsed().as_secs_f64());
                    error!(
                        "[{}] Exception {} attempt={}: {:#}",
                        label, task.stem, attempt, e
                    );
                }
            }

            if attempt < self.config.max_retries {
                let backoff = self.config.backoff_for(attempt);
                info!(
                    "[{}] Retry {} after {:.1}s...",
                    label,
                    task.stem,
                    backoff.as_secs_f64()
                );
                std::thread::sleep(backoff);
            }
        }

        result.status = TaskStatus::Fail;
        result.reason = reasons::FAILED_AFTER_RETRIES.to_string();
        error!(
            "[{}] FAIL {} after {} attempts",
            label, task.stem, result.attempts
        );
        result
    }

    /// Run the pipeline, turning a panic into an ordinary error
    fn run_guarded(&self, task: &Task, mode: ReadMode) -> Result<WriteStats> {
        catch_unwind(AssertUnwindSafe(|| self.pipeline.run(task, mode, self.config)))
            .unwrap_or_else(|payload| {
                Err(Error::conversion(
                    &task.input_path,
                    format!("panicked: {}", panic_message(payload.as_ref())),
                ))
            })
    }
}

fn output_exists(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn round_secs(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
