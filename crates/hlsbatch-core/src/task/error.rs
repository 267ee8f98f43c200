//! Errors for task construction and state transitions.

use thiserror::Error;

use super::types::{TaskId, TaskState};

/// Fields that cannot make a valid descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("segment duration must be a positive number of seconds")]
    ZeroSegmentDuration,
    #[error("source path is empty")]
    EmptySource,
    #[error("output name is empty")]
    EmptyOutputName,
    #[error("output name {0:?} must not contain path separators")]
    InvalidOutputName(String),
}

/// Rejected lifecycle transition (e.g. leaving a terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task {id}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub id: TaskId,
    pub from: TaskState,
    pub to: TaskState,
}
