//! The coordinator: single owner of task state, counters, and the presenter.
//!
//! Runs on the thread that called `Dispatcher::run`. Admits tasks FIFO up to
//! the concurrency limit, drains the event channel, and folds each terminal
//! result into the task and the aggregator exactly once.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::presenter::Presenter;
use crate::progress::{BatchSummary, ProgressAggregator};
use crate::report::{BatchReport, TaskReport};
use crate::runner::{RunOutcome, RunResult};
use crate::task::{TaskDescriptor, TaskId, TaskState};

use super::batch::{BatchGate, BatchStatus};
use super::event::Event;
use super::pool::WorkerPool;

/// What the coordinator remembers about a terminal task.
#[derive(Debug, Default)]
struct Record {
    message: Option<String>,
    output_tail: Vec<String>,
}

pub(super) struct Coordinator<'p> {
    tasks: Vec<TaskDescriptor>,
    records: Vec<Record>,
    index: HashMap<TaskId, usize>,
    queue: VecDeque<usize>,
    agg: ProgressAggregator,
    limit: usize,
    gate: Arc<BatchGate>,
    presenter: &'p mut dyn Presenter,
    progress_interval: Duration,
    stop_seen: bool,
    summary: Option<BatchSummary>,
}

impl<'p> Coordinator<'p> {
    pub(super) fn new(
        tasks: Vec<TaskDescriptor>,
        limit: usize,
        gate: Arc<BatchGate>,
        presenter: &'p mut dyn Presenter,
        progress_interval: Duration,
    ) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id(), i))
            .collect();
        let records = tasks.iter().map(|_| Record::default()).collect();
        Self {
            agg: ProgressAggregator::new(tasks.len()),
            queue: (0..tasks.len()).collect(),
            tasks,
            records,
            index,
            limit,
            gate,
            presenter,
            progress_interval,
            stop_seen: false,
            summary: None,
        }
    }

    /// Drives the batch until every admitted task is terminal and nothing is
    /// left to admit, then finalizes.
    pub(super) fn run(mut self, pool: &WorkerPool, events: &Receiver<Event>) -> BatchReport {
        self.fill(pool);
        let mut last_progress = Instant::now();
        while !self.is_done() {
            let wait = self
                .progress_interval
                .saturating_sub(last_progress.elapsed());
            match events.recv_timeout(wait) {
                Ok(event) => self.apply(event, pool),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::error!("event channel closed with tasks in flight");
                    break;
                }
            }
            self.observe_stop();
            if last_progress.elapsed() >= self.progress_interval {
                self.push_progress();
                last_progress = Instant::now();
            }
        }
        self.finalize();
        self.into_report()
    }

    fn is_done(&self) -> bool {
        let more_to_admit = !self.queue.is_empty() && self.gate.status() == BatchStatus::Running;
        self.agg.is_complete(more_to_admit)
    }

    /// Admits queued tasks while there is room under the limit.
    fn fill(&mut self, pool: &WorkerPool) {
        while self.agg.running() < self.limit && self.admit_next(pool) {}
    }

    /// Admits the head of the queue. The status check and the Pending ->
    /// Running transition happen under the gate, so a concurrent `stop`
    /// either lands before (nothing admitted) or after (task counted as running).
    fn admit_next(&mut self, pool: &WorkerPool) -> bool {
        let i = {
            let status = self.gate.lock_status();
            if *status != BatchStatus::Running {
                return false;
            }
            let Some(i) = self.queue.pop_front() else {
                return false;
            };
            if let Err(e) = self.tasks[i].transition(TaskState::Running) {
                tracing::error!("cannot admit task: {}", e);
                return true;
            }
            self.agg.record_submitted();
            i
        };

        let task = &self.tasks[i];
        let id = task.id();
        let name = task.display_name();
        self.presenter.on_task_submitted(id);
        self.presenter
            .on_task_state_changed(id, TaskState::Running);
        self.presenter.on_log(
            &format!("submitting task {}/{}: {}", id.0, self.tasks.len(), name),
            Some(id),
        );
        self.push_progress();

        if let Err(task) = pool.submit(self.tasks[i].clone()) {
            self.apply_result(RunResult {
                id: task.id(),
                outcome: RunOutcome::Failed,
                message: "worker pool is gone; task could not be dispatched".to_string(),
                output_tail: Vec::new(),
            });
        }
        true
    }

    fn apply(&mut self, event: Event, pool: &WorkerPool) {
        match event {
            Event::Log { task, message } => self.presenter.on_log(&message, Some(task)),
            Event::Finished(result) => {
                self.apply_result(result);
                self.fill(pool);
            }
            Event::StopRequested => self.observe_stop(),
        }
    }

    /// Folds one terminal result into task state and counters. A result for a
    /// task that is not `Running` (unknown id, duplicate delivery) is ignored.
    fn apply_result(&mut self, result: RunResult) {
        let Some(&i) = self.index.get(&result.id) else {
            tracing::warn!(task = %result.id, "result for unknown task ignored");
            return;
        };
        let state = result.outcome.task_state();
        if let Err(e) = self.tasks[i].transition(state) {
            tracing::warn!("duplicate result ignored: {}", e);
            return;
        }
        self.agg.record_terminal(result.outcome);
        self.records[i] = Record {
            message: Some(result.message),
            output_tail: result.output_tail,
        };
        self.presenter.on_task_state_changed(result.id, state);
        self.push_progress();
    }

    fn observe_stop(&mut self) {
        if self.stop_seen || self.gate.status() != BatchStatus::Stopping {
            return;
        }
        self.stop_seen = true;
        let running = self.agg.running();
        let queued = self.queue.len();
        self.presenter.on_log(
            &format!(
                "stop requested: cancelling {} running task(s), {} queued task(s) will not run",
                running, queued
            ),
            None,
        );
    }

    fn push_progress(&mut self) {
        let snapshot = self.agg.snapshot();
        self.gate.publish(snapshot);
        self.presenter.on_progress(&snapshot);
    }

    /// Marks the batch `Finished` and reports the summary. Only the first
    /// call has any effect.
    pub(super) fn finalize(&mut self) -> Option<BatchSummary> {
        let summary = self.agg.finalize()?;
        self.gate.set_status(BatchStatus::Finished);
        for &i in &self.queue {
            self.records[i].message = Some("not run: batch was stopped".to_string());
        }
        if summary.not_run > 0 {
            self.presenter.on_log(
                &format!("{} task(s) were not started", summary.not_run),
                None,
            );
        }
        self.push_progress();
        self.presenter.on_log(
            &format!(
                "batch finished: {} succeeded, {} failed, {} cancelled, {} not run (of {})",
                summary.succeeded,
                summary.failed,
                summary.cancelled,
                summary.not_run,
                summary.batch_size
            ),
            None,
        );
        self.presenter.on_batch_finished(&summary);
        self.summary = Some(summary);
        Some(summary)
    }

    fn into_report(self) -> BatchReport {
        let summary = self.summary.unwrap_or_else(|| BatchSummary {
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            not_run: self.tasks.len(),
            total: 0,
            batch_size: self.tasks.len(),
        });
        let tasks = self
            .tasks
            .into_iter()
            .zip(self.records)
            .map(|(task, record)| TaskReport::new(task, record.message, record.output_tail))
            .collect();
        BatchReport { summary, tasks }
    }
}
