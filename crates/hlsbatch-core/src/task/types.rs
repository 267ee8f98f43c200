//! Types for conversion tasks.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{TaskError, TransitionError};

/// Task identifier, unique within a batch (1-based submission position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Pending, TaskState::Running) => true,
            (TaskState::Running, s) => s.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversion job: where to read, where to write, how to segment.
///
/// Everything but `state` is fixed at construction.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    id: TaskId,
    source_path: PathBuf,
    output_dir: PathBuf,
    segment_duration_secs: u32,
    output_name: String,
    state: TaskState,
}

impl TaskDescriptor {
    /// Build a pending task. The caller has already checked that the source
    /// exists; this only validates the fields.
    pub fn new(
        id: TaskId,
        source_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        segment_duration_secs: u32,
        output_name: impl Into<String>,
    ) -> Result<Self, TaskError> {
        let source_path = source_path.into();
        let output_name = output_name.into();
        if segment_duration_secs == 0 {
            return Err(TaskError::ZeroSegmentDuration);
        }
        if source_path.as_os_str().is_empty() {
            return Err(TaskError::EmptySource);
        }
        if output_name.trim().is_empty() {
            return Err(TaskError::EmptyOutputName);
        }
        if output_name.contains(|c| c == '/' || c == '\\') {
            return Err(TaskError::InvalidOutputName(output_name));
        }
        Ok(Self {
            id,
            source_path,
            output_dir: output_dir.into(),
            segment_duration_secs,
            output_name,
            state: TaskState::Pending,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn segment_duration_secs(&self) -> u32 {
        self.segment_duration_secs
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// File name of the source, for log lines.
    pub fn display_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }

    /// Playlist the encoder is expected to write: `<output_dir>/<output_name>.m3u8`.
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.m3u8", self.output_name))
    }

    /// Move to `next`, enforcing the monotonic lifecycle.
    pub(crate) fn transition(&mut self, next: TaskState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
