//! Parallel dispatcher
//!
//! A fixed pool of blocking workers pulls tasks from a shared queue and
//! streams one [`ConversionResult`] per task back to the dispatcher, which
//! collects them in completion order.

use crate::config::ConvertConfig;
use crate::constants::reasons;
use crate::error::{Error, Result};
use crate::logging::WorkerLogs;
use crate::models::{ConversionResult, Task};
use crate::processor::converter::{
    ConversionPipeline, CsvPipeline, RetryingConverter, panic_message,
};

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{Dispatch, error, info, info_span, warn};

type TaskQueue = Arc<Mutex<VecDeque<Task>>>;

/// Runs the retrying converter over a task list with N workers
pub struct Dispatcher {
    config: Arc<ConvertConfig>,
    pipeline: Arc<dyn ConversionPipeline>,
    worker_logs: Option<WorkerLogs>,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(config: Arc<ConvertConfig>) -> Self {
        Self {
            config,
            pipeline: Arc::new(CsvPipeline),
            worker_logs: None,
            show_progress: false,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ConversionPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Give every worker its own log file
    pub fn with_worker_logs(mut self, worker_logs: WorkerLogs) -> Self {
        self.worker_logs = Some(worker_logs);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Worker count for `task_count` tasks
    pub fn worker_count(&self, task_count: usize) -> usize {
        self.config.resolve_workers(task_count)
    }

    /// Convert every task; results arrive in completion order
    pub async fn dispatch(&self, tasks: Vec<Task>) -> Result<Vec<ConversionResult>> {
        let total = tasks.len();
        if total == 0 {
            warn!("No tasks to dispatch");
            return Ok(Vec::new());
        }

        let workers = self.worker_count(total);
        info!("Dispatching {} tasks to {} workers", total, workers);

        let queue: TaskQueue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, mut rx) = unbounded_channel();
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let sink = match &self.worker_logs {
                Some(logs) => match logs.dispatch_for(worker_id) {
                    Ok(dispatch) => Some(dispatch),
                    Err(e) => {
                        warn!("Worker {} log sink unavailable: {}", worker_id, e);
                        None
                    }
                },
                None => None,
            };
            let queue = queue.clone();
            let tx = tx.clone();
            let config = self.config.clone();
            let pipeline = self.pipeline.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                run_worker(worker_id, sink, queue, tx, config, pipeline)
            }));
        }
        // Only workers hold senders now; recv() ends once they all exit
        drop(tx);

        let progress = self.create_progress_bar(total as u64);
        let mut results = Vec::with_capacity(total);

        while let Some(result) = rx.recv().await {
            // Stderr log lines would otherwise tear the bar
            progress.suspend(|| {
                info!(
                    "[{}/{}] {} {}/{} {} | rows={} cols={} sec={} mode={} reason={}",
                    results.len() + 1,
                    total,
                    result.status,
                    result.year,
                    result.quarter,
                    result.stem,
                    result.rows,
                    result.cols,
                    result.seconds,
                    result.mode.map(|m| m.to_string()).unwrap_or_default(),
                    result.reason
                )
            });
            progress.inc(1);
            results.push(result);
        }
        progress.finish_with_message(format!("{} tasks converted", results.len()));

        for (worker_id, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                let err = Error::WorkerPanicked {
                    worker_id,
                    message: e.to_string(),
                };
                error!("{}", err);
            }
        }

        if results.len() != total {
            warn!(
                "Collected {} results for {} tasks; some tasks were lost",
                results.len(),
                total
            );
        }

        Ok(results)
    }

    fn create_progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} ETA: {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Converting");
        pb
    }
}

/// Body of one worker thread
fn run_worker(
    worker_id: usize,
    sink: Option<Dispatch>,
    queue: TaskQueue,
    tx: UnboundedSender<ConversionResult>,
    config: Arc<ConvertConfig>,
    pipeline: Arc<dyn ConversionPipeline>,
) {
    let work = || {
        let _span = info_span!("worker", id = worker_id).entered();
        info!("Worker initialized.");

        let converter = RetryingConverter::with_pipeline(&config, pipeline);
        let mut handled = 0usize;

        loop {
            let next = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some(task) = next else { break };

            let result = catch_unwind(AssertUnwindSafe(|| converter.convert(&task)))
                .unwrap_or_else(|payload| {
                    error!(
                        "[{}] Worker panic on {}: {}",
                        task.label(),
                        task.stem,
                        panic_message(payload.as_ref())
                    );
                    let mut result = ConversionResult::pending(&task);
                    result.reason = reasons::WORKER_PANICKED.to_string();
                    result
                });

            handled += 1;
            if tx.send(result).is_err() {
                warn!("Result channel closed; stopping");
                break;
            }
        }

        info!("Worker finished after {} tasks", handled);
    };

    match sink {
        Some(dispatch) => tracing::dispatcher::with_default(&dispatch, work),
        None => work(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RunDirectory;
    use crate::models::{ReadMode, TaskStatus};
    use crate::processor::writer::WriteStats;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tracing::level_filters::LevelFilter;

    fn fake_tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task {
                year: "2021".to_string(),
                quarter: "Q3".to_string(),
                stem: format!("DEMO{i:02}"),
                input_path: PathBuf::from(format!("/nonexistent/DEMO{i:02}.txt")),
                output_path: PathBuf::from(format!("/nonexistent/out/DEMO{i:02}.csv")),
            })
            .collect()
    }

    /// Pipeline that records which tasks reached it
    struct Recording {
        seen: Mutex<HashSet<String>>,
        calls: AtomicUsize,
    }

    impl ConversionPipeline for Recording {
        fn run(&self, task: &Task, _: ReadMode, _: &ConvertConfig) -> Result<WriteStats> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().insert(task.stem.clone());
            Ok(WriteStats { rows: 1, cols: 1 })
        }
    }

    #[tokio::test]
    async fn test_empty_task_list_short_circuits() {
        let dispatcher = Dispatcher::new(Arc::new(ConvertConfig::default()));
        let results = dispatcher.dispatch(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_every_task_yields_one_result() {
        let config = ConvertConfig::default().with_workers(3);
        let dispatcher = Dispatcher::new(Arc::new(config));

        // Inputs do not exist, so every task fails validation
        let results = dispatcher.dispatch(fake_tasks(10)).await.unwrap();

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.status == TaskStatus::Fail));
        assert!(results.iter().all(|r| r.reason == "NOT_FOUND"));
        let stems: HashSet<_> = results.iter().map(|r| r.stem.clone()).collect();
        assert_eq!(stems.len(), 10);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_result_lines_logged_with_progress_bar() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dispatcher =
            Dispatcher::new(Arc::new(ConvertConfig::default().with_workers(2))).with_progress(true);
        let results = dispatcher.dispatch(fake_tasks(3)).await.unwrap();
        assert_eq!(results.len(), 3);

        let logged = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        for n in 1..=3 {
            assert!(logged.contains(&format!("[{n}/3] FAIL 2021/Q3")));
        }
    }

    #[tokio::test]
    async fn test_each_task_runs_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let input_path = temp_dir.path().join(format!("DRUG{i}.txt"));
            std::fs::write(&input_path, "a$b\n1$2\n").unwrap();
            tasks.push(Task {
                year: "2022".to_string(),
                quarter: "Q2".to_string(),
                stem: format!("DRUG{i}"),
                input_path,
                output_path: temp_dir.path().join(format!("out/DRUG{i}.csv")),
            });
        }
        let pipeline = Arc::new(Recording {
            seen: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(Arc::new(ConvertConfig::default().with_workers(4)))
            .with_pipeline(pipeline.clone());

        let results = dispatcher.dispatch(tasks).await.unwrap();

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.status == TaskStatus::Ok));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 8);
        assert_eq!(pipeline.seen.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_workers_get_their_own_logs() {
        let temp_dir = TempDir::new().unwrap();
        let run_dir = RunDirectory::create_with_timestamp(temp_dir.path(), "ts").unwrap();
        let config = ConvertConfig::default().with_workers(2);
        let dispatcher = Dispatcher::new(Arc::new(config))
            .with_worker_logs(WorkerLogs::new(run_dir.clone(), LevelFilter::INFO));

        dispatcher.dispatch(fake_tasks(4)).await.unwrap();

        for worker_id in 0..2 {
            let log = std::fs::read_to_string(run_dir.worker_log_path(worker_id)).unwrap();
            assert!(log.contains("Worker initialized."));
        }
    }
}
