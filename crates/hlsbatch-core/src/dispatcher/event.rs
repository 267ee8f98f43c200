//! Messages funneled from workers and handles to the coordinator.

use crate::runner::RunResult;
use crate::task::TaskId;

#[derive(Debug)]
pub(crate) enum Event {
    /// A runner log line addressed to the presenter.
    Log { task: TaskId, message: String },
    /// A task reached its terminal outcome.
    Finished(RunResult),
    /// A handle moved the batch to `Stopping`.
    StopRequested,
}
