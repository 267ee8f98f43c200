//! Process runner: one encoder invocation per task, supervised to a terminal outcome.
//!
//! The runner blocks the calling worker thread on the child process, polling
//! the batch cancellation token while it waits. On cancellation it escalates
//! SIGTERM -> grace period -> kill and reports `Cancelled` no matter what the
//! encoder managed to write.

mod error;
mod output;
mod terminate;

use serde::Serialize;
use std::fmt;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::CancelToken;
use crate::encoder::{inspect_outputs, Encoder};
use crate::task::{TaskDescriptor, TaskId, TaskState};

pub use error::{ProcessFailure, SpawnError};

use output::OutputTail;
use terminate::{terminate_with_grace, Termination};

/// How often a running child is checked for exit and cancellation.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default wait between SIGTERM and kill.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

const DEFAULT_TAIL_LINES: usize = 20;
const READER_SETTLE: Duration = Duration::from_millis(200);

/// Terminal outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub fn task_state(self) -> TaskState {
        match self {
            RunOutcome::Succeeded => TaskState::Succeeded,
            RunOutcome::Failed => TaskState::Failed,
            RunOutcome::Cancelled => TaskState::Cancelled,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.task_state(), f)
    }
}

/// What a runner hands back to the coordinator for one task.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub id: TaskId,
    pub outcome: RunOutcome,
    pub message: String,
    /// Last lines the encoder printed (stdout and stderr interleaved).
    pub output_tail: Vec<String>,
}

/// Spawns and supervises encoder processes. Shared by all workers of a batch.
#[derive(Clone)]
pub struct ProcessRunner {
    encoder: Arc<dyn Encoder>,
    grace: Duration,
    tail_lines: usize,
}

impl fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("encoder", &self.encoder.name())
            .field("grace", &self.grace)
            .finish()
    }
}

impl ProcessRunner {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            grace: DEFAULT_CANCEL_GRACE,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Wait between the termination request and the kill.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Runs `task` to a terminal outcome. `log` receives the start and
    /// outcome lines meant for the presenter.
    pub fn run(
        &self,
        task: &TaskDescriptor,
        cancel: &CancelToken,
        log: &mut dyn FnMut(String),
    ) -> RunResult {
        let id = task.id();
        log(format!("task {} started: {}", id, task.display_name()));
        tracing::info!(task = %id, source = %task.source_path().display(), "starting conversion");

        let started = Instant::now();
        let (outcome, message, output_tail) = self.supervise(task, cancel);

        match outcome {
            RunOutcome::Succeeded => {
                tracing::info!(task = %id, elapsed_ms = started.elapsed().as_millis() as u64, "{}", message)
            }
            RunOutcome::Failed => tracing::warn!(task = %id, "{}", message),
            RunOutcome::Cancelled => tracing::info!(task = %id, "{}", message),
        }
        log(format!("task {} {}: {}", id, outcome, message));

        RunResult {
            id,
            outcome,
            message,
            output_tail,
        }
    }

    fn supervise(
        &self,
        task: &TaskDescriptor,
        cancel: &CancelToken,
    ) -> (RunOutcome, String, Vec<String>) {
        if cancel.is_cancelled() {
            return (
                RunOutcome::Cancelled,
                "cancelled by stop before the encoder started".to_string(),
                Vec::new(),
            );
        }

        let tail = OutputTail::new(self.tail_lines);
        let (mut child, readers) = match self.spawn(task, &tail) {
            Ok(spawned) => spawned,
            Err(e) => {
                return (
                    RunOutcome::Failed,
                    format!("process spawn error: {}", e),
                    Vec::new(),
                )
            }
        };

        let waited = wait_or_cancel(&mut child, cancel, self.grace);
        output::settle(readers, READER_SETTLE);
        let output_tail = tail.snapshot();

        let (outcome, message) = match waited {
            Ok(Waited::Exited(status)) => classify_exit(task, status),
            Ok(Waited::Cancelled(termination)) => {
                let (how, status) = match termination {
                    Termination::Graceful(status) => ("terminated", status),
                    Termination::Killed(status) => ("killed after grace period", status),
                };
                tracing::debug!(task = %task.id(), %status, "cancelled encoder reaped");
                (
                    RunOutcome::Cancelled,
                    format!("cancelled by stop (encoder {})", how),
                )
            }
            Err(e) => (RunOutcome::Failed, ProcessFailure::Wait(e).to_string()),
        };
        (outcome, message, output_tail)
    }

    fn spawn(
        &self,
        task: &TaskDescriptor,
        tail: &OutputTail,
    ) -> Result<(Child, Vec<std::thread::JoinHandle<()>>), SpawnError> {
        if !task.source_path().is_file() {
            return Err(SpawnError::SourceMissing {
                path: task.source_path().to_path_buf(),
            });
        }
        std::fs::create_dir_all(task.output_dir()).map_err(|source| SpawnError::OutputDir {
            path: task.output_dir().to_path_buf(),
            source,
        })?;

        let mut cmd = self.encoder.command(task);
        let program = cmd.get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: a terminal Ctrl-C goes to us, and we turn it into a stop.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(program.clone(), e))?;
        tracing::debug!(task = %task.id(), pid = child.id(), %program, "encoder spawned");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tail.capture(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tail.capture(stderr));
        }
        Ok((child, readers))
    }
}

enum Waited {
    Exited(ExitStatus),
    Cancelled(Termination),
}

fn wait_or_cancel(
    child: &mut Child,
    cancel: &CancelToken,
    grace: Duration,
) -> std::io::Result<Waited> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Waited::Exited(status)),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
        if cancel.is_cancelled() {
            tracing::debug!(pid = child.id(), "cancellation requested, terminating encoder");
            return terminate_with_grace(child, grace).map(Waited::Cancelled);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn classify_exit(task: &TaskDescriptor, status: ExitStatus) -> (RunOutcome, String) {
    if !status.success() {
        let failure = ProcessFailure::NonZeroExit {
            status: status.to_string(),
        };
        return (RunOutcome::Failed, failure.to_string());
    }
    match inspect_outputs(task) {
        Ok(found) if found.is_complete() => (
            RunOutcome::Succeeded,
            format!("converted into {} chunk(s)", found.chunks),
        ),
        Ok(found) => {
            let failure = ProcessFailure::MissingOutputs {
                playlist: found.playlist,
                chunks: found.chunks,
            };
            (RunOutcome::Failed, failure.to_string())
        }
        Err(e) => (RunOutcome::Failed, ProcessFailure::Inspect(e).to_string()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::tempdir;

    /// Runs `sh -c <script>` with `$1` = output dir and `$2` = output name.
    struct ShellEncoder(&'static str);

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

    fn setup(script: &'static str) -> (tempfile::TempDir, TaskDescriptor, ProcessRunner) {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        std::fs::write(&source, b"video").unwrap();
        let task =
            TaskDescriptor::new(TaskId(7), &source, dir.path().join("out"), 10, "in").unwrap();
        let runner = ProcessRunner::new(Arc::new(ShellEncoder(script)))
            .with_grace(Duration::from_millis(300));
        (dir, task, runner)
    }

    fn run(runner: &ProcessRunner, task: &TaskDescriptor, cancel: &CancelToken) -> (RunResult, Vec<String>) {
        let mut lines = Vec::new();
        let result = runner.run(task, cancel, &mut |l: String| lines.push(l));
        (result, lines)
    }

    #[test]
    fn success_requires_playlist_and_chunks() {
        let (_dir, task, runner) =
            setup(r#"echo encoding; touch "$1/$2.m3u8" "$1/$2_000.ts" "$1/$2_001.ts""#);
        let (result, lines) = run(&runner, &task, &CancelToken::new());
        assert_eq!(result.outcome, RunOutcome::Succeeded);
        assert!(result.message.contains("2 chunk"));
        assert_eq!(result.output_tail, vec!["encoding".to_string()]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("started"));
    }

    #[test]
    fn zero_exit_without_outputs_fails() {
        let (_dir, task, runner) = setup(r#"touch "$1/$2.m3u8""#);
        let (result, _) = run(&runner, &task, &CancelToken::new());
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.message.contains("outputs are missing"), "{}", result.message);
    }

    #[test]
    fn nonzero_exit_fails_even_with_outputs() {
        let (_dir, task, runner) =
            setup(r#"touch "$1/$2.m3u8" "$1/$2_000.ts"; echo boom >&2; exit 3"#);
        let (result, _) = run(&runner, &task, &CancelToken::new());
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.message.contains("nonzero exit"), "{}", result.message);
        assert_eq!(result.output_tail, vec!["boom".to_string()]);
    }

    #[test]
    fn missing_source_is_a_spawn_error() {
        let (dir, _task, runner) = setup("exit 0");
        let task = TaskDescriptor::new(
            TaskId(8),
            dir.path().join("absent.mp4"),
            dir.path().join("out"),
            10,
            "absent",
        )
        .unwrap();
        let (result, _) = run(&runner, &task, &CancelToken::new());
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.message.starts_with("process spawn error"), "{}", result.message);
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        struct Missing;
        impl Encoder for Missing {
            fn name(&self) -> &str {
                "missing"
            }
            fn command(&self, _task: &TaskDescriptor) -> Command {
                Command::new("/nonexistent/encoder-binary")
            }
        }
        let (_dir, task, _) = setup("exit 0");
        let runner = ProcessRunner::new(Arc::new(Missing));
        let (result, _) = run(&runner, &task, &CancelToken::new());
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.message.contains("not found"), "{}", result.message);
    }

    #[test]
    fn cancelled_before_spawn_never_runs() {
        let (_dir, task, runner) = setup(r#"touch "$1/ran""#);
        let cancel = CancelToken::new();
        cancel.cancel();
        let (result, _) = run(&runner, &task, &cancel);
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(!task.output_dir().join("ran").exists());
    }

    #[test]
    fn cancel_terminates_running_encoder() {
        let (_dir, task, runner) =
            setup(r#"touch "$1/$2.m3u8" "$1/$2_000.ts"; exec sleep 30"#);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });
        let started = Instant::now();
        let (result, _) = run(&runner, &task, &cancel);
        stopper.join().unwrap();
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn encoder_ignoring_sigterm_is_killed() {
        let (_dir, task, runner) = setup(r#"trap '' TERM; while true; do sleep 0.05; done"#);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });
        let (result, _) = run(&runner, &task, &cancel);
        stopper.join().unwrap();
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(result.message.contains("killed"), "{}", result.message);
    }
    /// True while `pid` exists and is not a zombie.
    #[cfg(target_os = "linux")]
    fn alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .map(|state| state != "Z" && state != "X")
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Starts the encoder, waits for it to record its background child's pid,
    /// cancels, and returns the result plus that pid.
    #[cfg(target_os = "linux")]
    fn cancel_with_background_child(script: &'static str) -> (RunResult, u32) {
        let (_dir, task, runner) = setup(script);
        let pid_file = task.output_dir().join("child.pid");
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let watched = pid_file.clone();
        let stopper = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !watched.exists() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            std::thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let (result, _) = run(&runner, &task, &cancel);
        stopper.join().unwrap();
        let pid = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        (result, pid)
    }

    #[cfg(target_os = "linux")]
    fn gone_within(pid: u32, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while alive(pid) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        true
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cancel_reaches_processes_the_encoder_started() {
        let (result, pid) =
            cancel_with_background_child(r#"sleep 30 & echo $! > "$1/child.pid"; wait"#);
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(gone_within(pid, Duration::from_secs(3)), "child {} survived cancel", pid);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cancel_kills_children_that_ignore_sigterm() {
        let (result, pid) = cancel_with_background_child(
            r#"(trap '' TERM; exec sleep 30) & echo $! > "$1/child.pid"; wait"#,
        );
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(gone_within(pid, Duration::from_secs(3)), "child {} survived cancel", pid);
    }
}
