//! A batch of tasks, its status gate, and the handle used to stop it.

use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::config;
use crate::control::CancelToken;
use crate::progress::ProgressSnapshot;
use crate::task::{TaskDescriptor, TaskId};

use super::event::Event;

/// Lifecycle of a batch. `Finished` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Idle,
    Running,
    Stopping,
    Finished,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Idle => "idle",
            BatchStatus::Running => "running",
            BatchStatus::Stopping => "stopping",
            BatchStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// The batch cannot be started as given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionRejected {
    #[error("batch has no tasks")]
    EmptyBatch,
    #[error("concurrency limit {limit} is outside 1..={max}")]
    ConcurrencyOutOfRange { limit: usize, max: usize },
    #[error("task id {0} appears more than once")]
    DuplicateTaskId(TaskId),
}

/// A stop request that arrived when the batch was not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot stop a batch that is {status}")]
pub struct StopRejected {
    pub status: BatchStatus,
}

/// State shared between the coordinator and batch handles.
///
/// `status` is the one lock in the scheduler: admission (Pending -> Running)
/// and `stop` both take it, so no task is admitted once `stop` has returned.
#[derive(Debug)]
pub(crate) struct BatchGate {
    status: Mutex<BatchStatus>,
    published: Mutex<ProgressSnapshot>,
    cancel: CancelToken,
}

impl BatchGate {
    fn new(total: usize) -> Self {
        Self {
            status: Mutex::new(BatchStatus::Idle),
            published: Mutex::new(ProgressSnapshot {
                total,
                ..ProgressSnapshot::default()
            }),
            cancel: CancelToken::new(),
        }
    }

    pub(crate) fn lock_status(&self) -> MutexGuard<'_, BatchStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn status(&self) -> BatchStatus {
        *self.lock_status()
    }

    pub(crate) fn set_status(&self, status: BatchStatus) {
        *self.lock_status() = status;
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn publish(&self, snapshot: ProgressSnapshot) {
        *self.published.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }

    fn published(&self) -> ProgressSnapshot {
        *self.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An ordered set of tasks plus the concurrency limit they run under.
#[derive(Debug)]
pub struct BatchRun {
    pub(super) tasks: Vec<TaskDescriptor>,
    pub(super) concurrency_limit: usize,
    pub(super) gate: Arc<BatchGate>,
    pub(super) events_tx: Sender<Event>,
    pub(super) events_rx: Receiver<Event>,
}

impl BatchRun {
    /// Validates the batch: at least one task, unique ids, and a limit in
    /// `1..=config::max_concurrency()`.
    pub fn new(
        tasks: Vec<TaskDescriptor>,
        concurrency_limit: usize,
    ) -> Result<Self, SubmissionRejected> {
        Self::with_max_concurrency(tasks, concurrency_limit, config::max_concurrency())
    }

    /// Same as [`BatchRun::new`] with an explicit upper bound on the limit.
    pub fn with_max_concurrency(
        tasks: Vec<TaskDescriptor>,
        concurrency_limit: usize,
        max: usize,
    ) -> Result<Self, SubmissionRejected> {
        if tasks.is_empty() {
            return Err(SubmissionRejected::EmptyBatch);
        }
        if concurrency_limit == 0 || concurrency_limit > max {
            return Err(SubmissionRejected::ConcurrencyOutOfRange {
                limit: concurrency_limit,
                max,
            });
        }
        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !seen.insert(task.id()) {
                return Err(SubmissionRejected::DuplicateTaskId(task.id()));
            }
        }
        let (events_tx, events_rx) = mpsc::channel();
        Ok(Self {
            gate: Arc::new(BatchGate::new(tasks.len())),
            tasks,
            concurrency_limit,
            events_tx,
            events_rx,
        })
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn status(&self) -> BatchStatus {
        self.gate.status()
    }

    /// Handle for stopping or observing the batch from other threads.
    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            gate: Arc::clone(&self.gate),
            wake: self.events_tx.clone(),
        }
    }
}

/// Cloneable, thread-safe handle to a batch: stop it, read its status and
/// latest progress snapshot.
#[derive(Debug, Clone)]
pub struct BatchHandle {
    gate: Arc<BatchGate>,
    wake: Sender<Event>,
}

impl BatchHandle {
    /// Moves a running batch to `Stopping`: queued tasks are no longer
    /// admitted and in-flight encoders are terminated. Rejected unless the
    /// batch is `Running`.
    pub fn stop(&self) -> Result<(), StopRejected> {
        {
            let mut status = self.gate.lock_status();
            if *status != BatchStatus::Running {
                return Err(StopRejected { status: *status });
            }
            *status = BatchStatus::Stopping;
            self.gate.cancel.cancel();
        }
        // Wakes the coordinator; it also notices on its next poll if this is lost.
        let _ = self.wake.send(Event::StopRequested);
        tracing::info!("batch stop requested");
        Ok(())
    }

    pub fn status(&self) -> BatchStatus {
        self.gate.status()
    }

    /// Latest snapshot published by the coordinator.
    pub fn progress(&self) -> ProgressSnapshot {
        self.gate.published()
    }
}
