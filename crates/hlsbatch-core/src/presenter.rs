//! Presenter: the outward-facing observer of a batch (console, GUI, tests).
//!
//! Every callback is invoked on the dispatcher's coordinator thread, in the
//! order the coordinator applied the events. A presenter only renders; it
//! never writes back into task or batch state.

use crate::progress::{BatchSummary, ProgressSnapshot};
use crate::task::{TaskId, TaskState};

/// Receives batch events pushed by the coordinator.
pub trait Presenter {
    /// A task was handed to the worker pool.
    fn on_task_submitted(&mut self, _id: TaskId) {}

    fn on_task_state_changed(&mut self, _id: TaskId, _state: TaskState) {}

    /// Fresh counters, pushed on every change and on the polling cadence.
    fn on_progress(&mut self, _snapshot: &ProgressSnapshot) {}

    /// Fired exactly once per batch.
    fn on_batch_finished(&mut self, _summary: &BatchSummary) {}

    fn on_log(&mut self, _message: &str, _task: Option<TaskId>) {}
}

/// Presenter that forwards everything to `tracing`.
#[derive(Debug, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn on_task_submitted(&mut self, id: TaskId) {
        tracing::debug!(task = %id, "submitted");
    }

    fn on_task_state_changed(&mut self, id: TaskId, state: TaskState) {
        tracing::debug!(task = %id, %state, "state changed");
    }

    fn on_progress(&mut self, s: &ProgressSnapshot) {
        tracing::trace!(
            completed = s.completed,
            total = s.total,
            running = s.running,
            "progress"
        );
    }

    fn on_batch_finished(&mut self, s: &BatchSummary) {
        tracing::info!(
            succeeded = s.succeeded,
            failed = s.failed,
            cancelled = s.cancelled,
            not_run = s.not_run,
            "batch finished"
        );
    }

    fn on_log(&mut self, message: &str, task: Option<TaskId>) {
        match task {
            Some(id) => tracing::info!(task = %id, "{}", message),
            None => tracing::info!("{}", message),
        }
    }
}
