//! Batch report: the summary plus every task's final state and message.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::progress::BatchSummary;
use crate::task::{TaskDescriptor, TaskId, TaskState};

/// Final record of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub state: TaskState,
    /// Outcome message (failure cause, chunk count, or why it never ran).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_tail: Vec<String>,
}

impl TaskReport {
    pub fn new(task: TaskDescriptor, message: Option<String>, output_tail: Vec<String>) -> Self {
        Self {
            id: task.id(),
            source_path: task.source_path().to_path_buf(),
            output_dir: task.output_dir().to_path_buf(),
            output_name: task.output_name().to_string(),
            state: task.state(),
            message,
            output_tail,
        }
    }
}

/// Everything a finished batch has to say, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub tasks: Vec<TaskReport>,
}

impl BatchReport {
    pub fn task(&self, id: TaskId) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_in(&self, state: TaskState) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(move |t| t.state == state)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize batch report")
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create report dir: {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("write report: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "batch report written");
        Ok(())
    }
}
