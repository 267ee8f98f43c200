//! Batch dispatcher: bounded-concurrency execution of a batch of conversions.
//!
//! Keeps up to `concurrency_limit` tasks running at once on a fixed pool of
//! worker threads; when one finishes, the next queued task is admitted until
//! the queue is empty or the batch is stopped. All results flow back over a
//! single channel to the coordinator, which is the only writer of batch state.

mod batch;
mod coordinator;
mod event;
mod pool;

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::presenter::Presenter;
use crate::report::BatchReport;
use crate::runner::ProcessRunner;

pub use batch::{BatchHandle, BatchRun, BatchStatus, StopRejected, SubmissionRejected};

use coordinator::Coordinator;
use pool::WorkerPool;

/// Default cadence of progress snapshots when nothing changes.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Failures fatal to a whole batch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not start worker pool: {started} of {requested} threads started: {source}")]
    PoolSpawn {
        requested: usize,
        started: usize,
        #[source]
        source: io::Error,
    },
}

/// Runs batches through a [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runner: ProcessRunner,
    progress_interval: Duration,
}

impl Dispatcher {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Runs `batch` to `Finished`, blocking the calling thread, which becomes
    /// the coordinator: every `presenter` callback happens here. Per-task
    /// failures are recorded in the report; only a worker pool that cannot be
    /// created fails the call.
    pub fn run(
        &self,
        batch: BatchRun,
        presenter: &mut dyn Presenter,
    ) -> Result<BatchReport, DispatchError> {
        let BatchRun {
            tasks,
            concurrency_limit,
            gate,
            events_tx,
            events_rx,
        } = batch;

        let workers = concurrency_limit.min(tasks.len());
        let mut pool = match WorkerPool::spawn(
            workers,
            self.runner.clone(),
            gate.cancel_token().clone(),
            events_tx.clone(),
        ) {
            Ok(pool) => pool,
            Err(e) => {
                gate.set_status(BatchStatus::Finished);
                tracing::error!("{}", e);
                return Err(e);
            }
        };

        gate.set_status(BatchStatus::Running);
        tracing::info!(
            tasks = tasks.len(),
            limit = concurrency_limit,
            "batch started"
        );
        presenter.on_log(
            &format!(
                "starting batch: {} task(s), up to {} at once",
                tasks.len(),
                concurrency_limit
            ),
            None,
        );

        let coordinator = Coordinator::new(
            tasks,
            concurrency_limit,
            gate,
            presenter,
            self.progress_interval,
        );
        let report = coordinator.run(&pool, &events_rx);
        pool.shutdown();
        drop(events_tx);

        Ok(report)
    }
}
