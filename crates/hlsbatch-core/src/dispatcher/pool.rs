//! Fixed-size pool of worker threads running tasks through the process runner.
//!
//! Workers pull admitted tasks from one shared job channel and push every
//! outcome back over the event channel; they never touch batch state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::control::CancelToken;
use crate::runner::{ProcessRunner, RunOutcome, RunResult};
use crate::task::TaskDescriptor;

use super::event::Event;
use super::DispatchError;

pub(super) struct WorkerPool {
    jobs: Option<Sender<TaskDescriptor>>,
    // Held so submitted tasks stay queued even before a worker picks them up.
    _queue: Arc<Mutex<Receiver<TaskDescriptor>>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` workers. If any thread cannot be created, the ones
    /// already started are shut down and the batch fails.
    pub(super) fn spawn(
        size: usize,
        runner: ProcessRunner,
        cancel: CancelToken,
        events: Sender<Event>,
    ) -> Result<Self, DispatchError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<TaskDescriptor>();
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let mut pool = WorkerPool {
            jobs: Some(jobs_tx),
            _queue: Arc::clone(&jobs_rx),
            workers: Vec::with_capacity(size),
        };
        for n in 0..size {
            let jobs = Arc::clone(&jobs_rx);
            let runner = runner.clone();
            let cancel = cancel.clone();
            let events = events.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("hls-worker-{}", n))
                .spawn(move || worker_loop(&jobs, &runner, &cancel, &events));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    pool.shutdown();
                    return Err(DispatchError::PoolSpawn {
                        requested: size,
                        started: n,
                        source,
                    });
                }
            }
        }
        tracing::debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Hands an admitted task to the next idle worker. Gives the task back
    /// if every worker is gone.
    pub(super) fn submit(&self, task: TaskDescriptor) -> Result<(), TaskDescriptor> {
        match &self.jobs {
            Some(tx) => tx.send(task).map_err(|e| e.0),
            None => Err(task),
        }
    }

    /// Closes the job channel and joins every worker.
    pub(super) fn shutdown(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                tracing::warn!("worker thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    jobs: &Mutex<Receiver<TaskDescriptor>>,
    runner: &ProcessRunner,
    cancel: &CancelToken,
    events: &Sender<Event>,
) {
    loop {
        let next = jobs.lock().unwrap_or_else(|e| e.into_inner()).recv();
        let Ok(task) = next else {
            break;
        };
        let id = task.id();
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            runner.run(&task, cancel, &mut |message: String| {
                let _ = events.send(Event::Log { task: id, message });
            })
        }));
        let result = run.unwrap_or_else(|_| {
            tracing::error!(task = %id, "runner panicked");
            RunResult {
                id,
                outcome: RunOutcome::Failed,
                message: "worker panicked while running the encoder".to_string(),
                output_tail: Vec::new(),
            }
        });
        if events.send(Event::Finished(result)).is_err() {
            break;
        }
    }
}
