//! Progress events delivered to the caller while a run executes.

use std::fmt;

use tokio::sync::mpsc;

use super::TaskOutcome;

/// Result of building one mosaic.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// The mosaic was written; `failed` member scenes could not be built.
    Built { scenes: usize, failed: usize },
    Failed { reason: String },
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Built { scenes, failed: 0 } => write!(f, "{} scenes", scenes),
            ItemStatus::Built { scenes, failed } => {
                write!(f, "{} scenes, {} failed", scenes, failed)
            }
            ItemStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Events emitted by a run, in stage order.
///
/// `Finished` is always the last event of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A catalog page was received. `received` counts unique scenes so far.
    PageProgress {
        index: usize,
        total: Option<usize>,
        received: usize,
    },

    /// Footprint filtering finished.
    FilterSummary { received: usize, filtered: usize },

    /// One mosaic (and its member scenes) was processed.
    BuildProgress {
        index: usize,
        total: usize,
        label: String,
        status: ItemStatus,
    },

    Finished(TaskOutcome),
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEvent::PageProgress {
                index,
                total: Some(total),
                received,
            } => write!(
                f,
                "Processing page {} of {} ({} scenes)",
                index, total, received
            ),
            TaskEvent::PageProgress {
                index, received, ..
            } => write!(f, "Processing page {} ({} scenes)", index, received),
            TaskEvent::FilterSummary { received, filtered } => write!(
                f,
                "Totals: {} received, {} intersecting the area",
                received, filtered
            ),
            TaskEvent::BuildProgress {
                index,
                total,
                label,
                status,
            } => write!(f, "Mosaic {} of {}: {} ({})", index, total, label, status),
            TaskEvent::Finished(outcome) => write!(f, "{}", outcome),
        }
    }
}

/// Sending half of the event channel.
///
/// Sends never block; events sent after the receiver is dropped are
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<TaskEvent>>,
}

impl ProgressSink {
    /// Creates a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: TaskEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone: the caller stopped listening
            let _ = tx.send(event);
        }
    }

    pub fn page_progress(&self, index: usize, total: Option<usize>, received: usize) {
        self.emit(TaskEvent::PageProgress {
            index,
            total,
            received,
        });
    }

    pub fn filter_summary(&self, received: usize, filtered: usize) {
        self.emit(TaskEvent::FilterSummary { received, filtered });
    }

    pub fn build_progress(&self, index: usize, total: usize, label: String, status: ItemStatus) {
        self.emit(TaskEvent::BuildProgress {
            index,
            total,
            label,
            status,
        });
    }

    pub fn finished(&self, outcome: TaskOutcome) {
        self.emit(TaskEvent::Finished(outcome));
    }
}
