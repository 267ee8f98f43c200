//! Conversion task model: immutable job specification plus lifecycle state.
//!
//! A task moves `Pending -> Running -> {Succeeded, Failed, Cancelled}` and
//! never leaves a terminal state. Only the dispatcher's coordinator drives
//! transitions; everything else reads.

mod error;
mod types;

pub use error::{TaskError, TransitionError};
pub use types::{TaskDescriptor, TaskId, TaskState};
