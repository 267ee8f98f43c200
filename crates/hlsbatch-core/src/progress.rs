//! Batch progress counters and the summary reported when a batch finishes.
//!
//! The aggregator is owned by the dispatcher's coordinator and only changes
//! when a discrete event (admission, terminal result) is applied, so every
//! snapshot it hands out is internally consistent.

use serde::Serialize;

use crate::runner::RunOutcome;

/// Point-in-time view of a batch (presenter- and CLI-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Tasks in the batch.
    pub total: usize,
    /// Tasks admitted to the worker pool so far.
    pub submitted: usize,
    /// Admitted tasks that reached a terminal state.
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Admitted but not yet terminal.
    pub running: usize,
}

impl ProgressSnapshot {
    /// Fraction of the batch that is terminal, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }

    /// The counter invariants: `completed = succeeded + failed + cancelled`,
    /// `completed <= submitted <= total`, `running = submitted - completed`.
    pub fn is_consistent(&self) -> bool {
        self.completed == self.succeeded + self.failed + self.cancelled
            && self.completed <= self.submitted
            && self.submitted <= self.total
            && self.running == self.submitted - self.completed
    }
}

/// Final breakdown of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Tasks never admitted because the batch was stopped first.
    pub not_run: usize,
    /// Tasks admitted to the pool (`succeeded + failed + cancelled`).
    pub total: usize,
    /// Tasks in the batch (`total + not_run`).
    pub batch_size: usize,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.batch_size
    }
}

/// Counters for one batch. Single owner; no interior mutability.
#[derive(Debug)]
pub struct ProgressAggregator {
    total: usize,
    submitted: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    finalized: bool,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            submitted: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            finalized: false,
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    pub fn running(&self) -> usize {
        self.submitted - self.completed()
    }

    /// Counts one admission. Returns false (and counts nothing) if every task
    /// was already admitted or the batch is finalized.
    pub fn record_submitted(&mut self) -> bool {
        if self.finalized || self.submitted >= self.total {
            return false;
        }
        self.submitted += 1;
        true
    }

    /// Counts one terminal result. Returns false (and counts nothing) if it
    /// would make `completed` exceed `submitted` or the batch is finalized.
    pub fn record_terminal(&mut self, outcome: RunOutcome) -> bool {
        if self.finalized || self.completed() >= self.submitted {
            return false;
        }
        match outcome {
            RunOutcome::Succeeded => self.succeeded += 1,
            RunOutcome::Failed => self.failed += 1,
            RunOutcome::Cancelled => self.cancelled += 1,
        }
        true
    }

    /// Whether the batch is done: nothing in flight and nothing left to admit.
    pub fn is_complete(&self, more_to_admit: bool) -> bool {
        !more_to_admit && self.completed() == self.submitted
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            submitted: self.submitted,
            completed: self.completed(),
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
            running: self.running(),
        }
    }

    /// Closes the books. The first call returns the summary; any later call
    /// returns `None` and changes nothing.
    pub fn finalize(&mut self) -> Option<BatchSummary> {
        if self.finalized {
            return None;
        }
        self.finalized = true;
        Some(BatchSummary {
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
            not_run: self.total - self.submitted,
            total: self.submitted,
            batch_size: self.total,
        })
    }
}
