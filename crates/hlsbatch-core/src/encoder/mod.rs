//! Encoder collaborator: how a task becomes an external process invocation.
//!
//! The scheduler never looks inside the encoder; it only spawns the command
//! built here and inspects the artifacts the encoder leaves on disk.

mod artifacts;
mod ffmpeg;

use std::process::Command;

use crate::task::TaskDescriptor;

pub use artifacts::{inspect_outputs, OutputArtifacts};
pub use ffmpeg::{locate_ffmpeg, EncoderCheckError, FfmpegEncoder};

/// Builds the external command that converts one task.
pub trait Encoder: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// The process to spawn for `task`. Stdio is configured by the runner.
    fn command(&self, task: &TaskDescriptor) -> Command;
}
