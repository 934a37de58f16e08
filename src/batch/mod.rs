pub mod executor;
pub mod paths;
pub mod progress;

pub use executor::{FileFailure, FileOutcome, TaskExecutor};
pub use paths::OutputPathResolver;
pub use progress::{BatchEvent, ChannelSink, LogSink, ProgressSink};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::{AudioCodec, WavCodec};
use crate::config::{FailurePolicy, SampleFormat};
use crate::error::{Result, SlicerError};
use crate::report::{write_report, SliceMapping, TaskItem};
use crate::slicer::{SilenceSlicer, SliceAlgorithm, SliceParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Processing,
}

/// Everything a batch needs, captured when it starts.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Input files, in submission order.
    pub paths: Vec<PathBuf>,
    pub params: SliceParameters,
    /// Empty means next to each source file.
    pub output_dir: PathBuf,
    /// Where to write the slice mapping, if anywhere.
    pub report_path: Option<PathBuf>,
    pub sample_format: SampleFormat,
    pub failure_policy: FailurePolicy,
}

impl BatchRequest {
    pub fn new(paths: Vec<PathBuf>, params: SliceParameters) -> Self {
        Self {
            paths,
            params,
            output_dir: PathBuf::new(),
            report_path: None,
            sample_format: SampleFormat::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Statistics from a finished batch.
#[derive(Debug, Clone)]
pub struct BatchStats {
    pub files_total: usize,
    pub files_completed: usize,
    pub files_failed: usize,
    pub slices_written: usize,
    pub total_time: Duration,
}

/// Results of a finished batch, handed to the completion event and the handle.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Task entries in submission order. Slices are only filled in when a report was requested.
    pub mapping: SliceMapping,
    pub report_path: Option<PathBuf>,
    pub stats: BatchStats,
}

/// Clears the processing flag when dropped, including on panic.
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs one batch at a time on a background blocking task.
#[derive(Clone)]
pub struct BatchRunner {
    codec: Arc<dyn AudioCodec>,
    algorithm: Arc<dyn SliceAlgorithm>,
    processing: Arc<AtomicBool>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(Arc::new(WavCodec), Arc::new(SilenceSlicer))
    }
}

impl BatchRunner {
    pub fn new(codec: Arc<dyn AudioCodec>, algorithm: Arc<dyn SliceAlgorithm>) -> Self {
        Self {
            codec,
            algorithm,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> BatchState {
        if self.processing.load(Ordering::Acquire) {
            BatchState::Processing
        } else {
            BatchState::Idle
        }
    }

    /// Start slicing `request.paths` in the background.
    ///
    /// Rejected with [`SlicerError::BatchInProgress`] while another batch is
    /// running. Must be called from within a tokio runtime. An empty list
    /// completes straight away with no file events.
    pub fn start(
        &self,
        request: BatchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<BatchHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SlicerError::Worker(format!("No async runtime: {e}")))?;

        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SlicerError::BatchInProgress);
        }
        let guard = ProcessingGuard {
            flag: self.processing.clone(),
        };

        info!(
            "Starting batch of {} files with {} slicer",
            request.paths.len(),
            self.algorithm.name()
        );

        let executor = TaskExecutor::new(
            self.codec.clone(),
            self.algorithm.clone(),
            request.params.clone(),
            OutputPathResolver::new(&request.output_dir),
        )
        .with_sample_format(request.sample_format)
        .with_slice_records(request.report_path.is_some());

        let task = runtime.spawn_blocking(move || {
            let finished = AtomicBool::new(false);
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                run_batch(executor, request, sink.as_ref(), guard, &finished)
            }));
            result.unwrap_or_else(|payload| {
                let error = SlicerError::Worker(format!(
                    "Batch panicked: {}",
                    panic_message(payload.as_ref())
                ));
                warn!("{}", error);
                if !finished.load(Ordering::Acquire) {
                    sink.on_batch_failed(&error);
                }
                Err(error)
            })
        });
        Ok(BatchHandle { task })
    }
}

/// Handle to a running batch.
pub struct BatchHandle {
    task: JoinHandle<Result<BatchOutcome>>,
}

impl BatchHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the batch to finish.
    pub async fn wait(self) -> Result<BatchOutcome> {
        self.task
            .await
            .map_err(|e| SlicerError::Worker(e.to_string()))?
    }
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `finished` is set right before the terminal sink call.
fn run_batch(
    executor: TaskExecutor,
    request: BatchRequest,
    sink: &dyn ProgressSink,
    guard: ProcessingGuard,
    finished: &AtomicBool,
) -> Result<BatchOutcome> {
    let started = Instant::now();
    let total = request.paths.len();
    sink.on_batch_started(total);

    let mut tasks: Vec<TaskItem> = Vec::with_capacity(total);
    let mut files_failed = 0;
    let mut slices_written = 0;

    for (i, path) in request.paths.iter().enumerate() {
        match executor.process(path) {
            Ok(outcome) => {
                slices_written += outcome.chunks_written;
                tasks.push(outcome.task);
            }
            Err(failure) => {
                slices_written += failure.chunks_written;
                let e = failure.error;
                match request.failure_policy {
                    FailurePolicy::Abort => {
                        warn!("{} failed, aborting batch: {}", path.display(), e);
                        drop(guard);
                        finished.store(true, Ordering::Release);
                        sink.on_batch_failed(&e);
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        warn!("{} failed, continuing: {}", path.display(), e);
                        files_failed += 1;
                        tasks.push(TaskItem::failed(
                            paths::native_path(path),
                            failure.slices,
                            e.to_string(),
                        ));
                    }
                }
            }
        }
        sink.on_file_completed(i + 1);
    }

    let mapping = SliceMapping::build(request.output_dir.display().to_string(), tasks);

    if let Some(report_path) = &request.report_path {
        if let Err(e) = write_report(report_path, &mapping) {
            warn!("Batch finished but the report could not be written: {}", e);
            drop(guard);
            finished.store(true, Ordering::Release);
            sink.on_batch_failed(&e);
            return Err(e);
        }
    }

    let outcome = BatchOutcome {
        mapping,
        report_path: request.report_path,
        stats: BatchStats {
            files_total: total,
            files_completed: total - files_failed,
            files_failed,
            slices_written,
            total_time: started.elapsed(),
        },
    };

    info!(
        "Batch complete: {} slices from {}/{} files in {:.2}s",
        outcome.stats.slices_written,
        outcome.stats.files_completed,
        total,
        outcome.stats.total_time.as_secs_f64()
    );

    // Idle before the terminal event so the sink may start the next batch.
    drop(guard);
    finished.store(true, Ordering::Release);
    sink.on_batch_completed(&outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = BatchRequest::new(
            vec![PathBuf::from("a.wav")],
            crate::Config::default().slice_parameters(),
        );
        assert_eq!(request.output_dir, PathBuf::new());
        assert!(request.report_path.is_none());
        assert_eq!(request.failure_policy, FailurePolicy::Abort);
        assert_eq!(request.sample_format, SampleFormat::Pcm16);
    }

    #[test]
    fn test_new_runner_is_idle() {
        assert_eq!(BatchRunner::default().state(), BatchState::Idle);
    }

    #[test]
    fn test_start_outside_runtime_rejected() {
        let runner = BatchRunner::default();
        let request = BatchRequest::new(
            vec![PathBuf::from("a.wav")],
            crate::Config::default().slice_parameters(),
        );
        let result = runner.start(request, Arc::new(LogSink));
        assert!(matches!(result, Err(SlicerError::Worker(_))));
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn test_empty_worklist_completes() {
        let runner = BatchRunner::default();
        let request = BatchRequest::new(vec![], crate::Config::default().slice_parameters());
        let outcome = runner.start(request, Arc::new(LogSink)).unwrap().wait().await.unwrap();
        assert!(outcome.mapping.tasks.is_empty());
        assert_eq!(outcome.stats.files_total, 0);
        assert_eq!(outcome.stats.files_completed, 0);
        assert_eq!(runner.state(), BatchState::Idle);
    }

    /// Panics on the first file event and counts failure events.
    #[derive(Default)]
    struct PanickingSink {
        failed: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressSink for PanickingSink {
        fn on_file_completed(&self, _completed: usize) {
            panic!("progress display gone");
        }

        fn on_batch_completed(&self, _outcome: &BatchOutcome) {}

        fn on_batch_failed(&self, error: &SlicerError) {
            self.failed.lock().unwrap().push(error.to_string());
        }
    }

    #[tokio::test]
    async fn test_sink_panic_reported_as_failure() {
        let runner = BatchRunner::default();
        let request = BatchRequest::new(
            vec![PathBuf::from("/nonexistent/a.wav")],
            crate::Config::default().slice_parameters(),
        )
        .with_failure_policy(FailurePolicy::Continue);
        let sink = Arc::new(PanickingSink::default());

        let result = runner.start(request, sink.clone()).unwrap().wait().await;

        assert!(matches!(result, Err(SlicerError::Worker(_))));
        let failed = sink.failed.lock().unwrap().clone();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].contains("progress display gone"));
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[tokio::test]
    async fn test_guard_clears_flag_on_failure() {
        let runner = BatchRunner::default();
        let request = BatchRequest::new(
            vec![PathBuf::from("/nonexistent/a.wav")],
            crate::Config::default().slice_parameters(),
        );
        let handle = runner.start(request, Arc::new(LogSink)).unwrap();
        assert!(matches!(handle.wait().await, Err(SlicerError::InputRead(_))));
        assert_eq!(runner.state(), BatchState::Idle);
    }
}
