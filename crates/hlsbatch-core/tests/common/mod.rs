//! Shared fixtures for batch integration tests: a shell-script encoder that
//! stands in for ffmpeg, and a presenter that records every callback.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use hlsbatch_core::discover;
use hlsbatch_core::dispatcher::{BatchHandle, Dispatcher};
use hlsbatch_core::encoder::Encoder;
use hlsbatch_core::presenter::Presenter;
use hlsbatch_core::progress::{BatchSummary, ProgressSnapshot};
use hlsbatch_core::runner::ProcessRunner;
use hlsbatch_core::task::{TaskDescriptor, TaskId, TaskState};

/// Writes a playlist and two chunks, like a short successful encode.
pub const ENCODE_OK: &str = r#"sleep 0.05; echo "encoding $2"; touch "$1/$2.m3u8" "$1/$2_000.ts" "$1/$2_001.ts""#;

/// Runs until terminated.
pub const ENCODE_FOREVER: &str = "exec sleep 30";

/// Runs `sh -c <script> sh <output_dir> <output_name>`.
pub struct ShellEncoder(pub &'static str);

impl Encoder for ShellEncoder {
    fn name(&self) -> &str {
        "sh"
    }

    fn command(&self, task: &TaskDescriptor) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(self.0)
            .arg("sh")
            .arg(task.output_dir())
            .arg(task.output_name());
        cmd
    }
}

/// Dispatcher with short grace and progress intervals.
pub fn dispatcher(script: &'static str) -> Dispatcher {
    let runner = ProcessRunner::new(Arc::new(ShellEncoder(script)))
        .with_grace(Duration::from_millis(300));
    Dispatcher::new(runner).with_progress_interval(Duration::from_millis(20))
}

/// Creates `n` source files `clip1.mp4 ..` under `root/in` and plans their
/// tasks into `root/out`.
pub fn plan(root: &Path, n: usize) -> Vec<TaskDescriptor> {
    let inputs: Vec<PathBuf> = (1..=n)
        .map(|i| {
            let path = root.join("in").join(format!("clip{}.mp4", i));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"video").unwrap();
            path
        })
        .collect();
    discover::plan_tasks(&inputs, &root.join("out"), 10).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Submitted(TaskId),
    State(TaskId, TaskState),
    Progress(ProgressSnapshot),
    Finished(BatchSummary),
    Log(String, Option<TaskId>),
    StopSent,
}

/// Records every callback. Optionally calls `stop` from inside a callback
/// once `running` reaches a threshold.
#[derive(Default)]
pub struct Recorder {
    pub seen: Vec<Seen>,
    stop_at: Option<(usize, BatchHandle)>,
}

impl Recorder {
    pub fn stopping_at(running: usize, handle: BatchHandle) -> Self {
        Self {
            seen: Vec::new(),
            stop_at: Some((running, handle)),
        }
    }

    pub fn max_running(&self) -> usize {
        self.progress().map(|s| s.running).max().unwrap_or(0)
    }

    pub fn progress(&self) -> impl Iterator<Item = &ProgressSnapshot> {
        self.seen.iter().filter_map(|s| match s {
            Seen::Progress(p) => Some(p),
            _ => None,
        })
    }

    pub fn states_of(&self, id: TaskId) -> Vec<TaskState> {
        self.seen
            .iter()
            .filter_map(|s| match s {
                Seen::State(i, st) if *i == id => Some(*st),
                _ => None,
            })
            .collect()
    }

    pub fn finished_count(&self) -> usize {
        self.seen
            .iter()
            .filter(|s| matches!(s, Seen::Finished(_)))
            .count()
    }

    pub fn logs(&self) -> Vec<&str> {
        self.seen
            .iter()
            .filter_map(|s| match s {
                Seen::Log(m, _) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for Recorder {
    fn on_task_submitted(&mut self, id: TaskId) {
        self.seen.push(Seen::Submitted(id));
    }

    fn on_task_state_changed(&mut self, id: TaskId, state: TaskState) {
        self.seen.push(Seen::State(id, state));
    }

    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        self.seen.push(Seen::Progress(*snapshot));
        if let Some((threshold, handle)) = &self.stop_at {
            if snapshot.running >= *threshold && handle.stop().is_ok() {
                self.seen.push(Seen::StopSent);
            }
        }
    }

    fn on_batch_finished(&mut self, summary: &BatchSummary) {
        self.seen.push(Seen::Finished(*summary));
    }

    fn on_log(&mut self, message: &str, task: Option<TaskId>) {
        self.seen.push(Seen::Log(message.to_string(), task));
    }
}
