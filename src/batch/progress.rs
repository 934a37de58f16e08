use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::error::SlicerError;

use super::BatchOutcome;

/// Receives progress of a running batch.
///
/// `on_file_completed` is called once per submitted file with the 1-based
/// count of finished files. Exactly one of `on_batch_completed` or
/// `on_batch_failed` follows the last file event.
pub trait ProgressSink: Send + Sync {
    fn on_batch_started(&self, _total: usize) {}
    fn on_file_completed(&self, completed: usize);
    fn on_batch_completed(&self, outcome: &BatchOutcome);
    fn on_batch_failed(&self, error: &SlicerError);
}

/// Progress notification delivered as a message.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    FileCompleted { completed: usize },
    Completed(BatchOutcome),
    /// Abnormal termination, carrying the error message.
    Failed(String),
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Completed(_) | BatchEvent::Failed(_))
    }
}

/// Forwards progress to a channel so the caller can consume it on its own task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<BatchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<BatchEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: BatchEvent) {
        // The receiver may have gone away; the batch still runs to completion.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn on_batch_started(&self, total: usize) {
        self.send(BatchEvent::Started { total });
    }

    fn on_file_completed(&self, completed: usize) {
        self.send(BatchEvent::FileCompleted { completed });
    }

    fn on_batch_completed(&self, outcome: &BatchOutcome) {
        self.send(BatchEvent::Completed(outcome.clone()));
    }

    fn on_batch_failed(&self, error: &SlicerError) {
        self.send(BatchEvent::Failed(error.to_string()));
    }
}

/// Logs progress through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_batch_started(&self, total: usize) {
        info!("Slicing {} files", total);
    }

    fn on_file_completed(&self, completed: usize) {
        info!("Finished file {}", completed);
    }

    fn on_batch_completed(&self, outcome: &BatchOutcome) {
        info!(
            "Slicing complete: {} slices from {} files",
            outcome.stats.slices_written, outcome.stats.files_completed
        );
    }

    fn on_batch_failed(&self, error: &SlicerError) {
        warn!("Slicing aborted: {}", error);
    }
}
