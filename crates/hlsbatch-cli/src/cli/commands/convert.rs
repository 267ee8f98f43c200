//! `hlsbatch convert` – discover inputs and run them as one batch.

use anyhow::{bail, Context, Result};
use hlsbatch_core::config::HlsConfig;
use hlsbatch_core::discover;
use hlsbatch_core::dispatcher::{BatchHandle, BatchRun, Dispatcher, StopRejected};
use hlsbatch_core::encoder::FfmpegEncoder;
use hlsbatch_core::runner::ProcessRunner;
use hlsbatch_core::task::TaskState;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::control_socket;
use crate::cli::presenter::{print_listing, ConsolePresenter};

/// Exit status after a Ctrl-C that could not become a graceful stop.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a Ctrl-C press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// The batch accepted the stop; in-flight encoders are being terminated.
    Stopping,
    /// The batch was not running (still starting, or already stopping after
    /// an earlier press); give up and exit.
    Exit(StopRejected),
}

fn on_interrupt(handle: &BatchHandle) -> Interrupt {
    match handle.stop() {
        Ok(()) => Interrupt::Stopping,
        Err(rejected) => Interrupt::Exit(rejected),
    }
}

/// Flags of `hlsbatch convert`; unset values fall back to the config.
#[derive(Debug, Clone)]
pub struct ConvertArgs {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub segment: Option<u32>,
    pub jobs: Option<usize>,
    pub ffmpeg: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

pub async fn run_convert(cfg: &HlsConfig, args: ConvertArgs) -> Result<()> {
    let Some(output_root) = args.output.or_else(|| cfg.output_dir.clone()) else {
        bail!("no output directory: pass --output or set output_dir in the config");
    };
    let segment = args.segment.unwrap_or(cfg.segment_duration_secs);
    if segment == 0 {
        bail!("segment duration must be at least 1 second");
    }
    let jobs = args.jobs.unwrap_or_else(|| cfg.effective_concurrency());

    let encoder = FfmpegEncoder::discover(args.ffmpeg.as_deref().or(cfg.ffmpeg_path.as_deref()));
    let version = encoder
        .check()
        .with_context(|| format!("ffmpeg is not usable at {}", encoder.path().display()))?;
    tracing::info!(ffmpeg = %encoder.path().display(), "{}", version);

    let inputs = discover::collect_inputs(&args.inputs)?;
    let tasks = discover::plan_tasks(&inputs, &output_root, segment)?;
    std::fs::create_dir_all(&output_root)
        .with_context(|| format!("create output directory: {}", output_root.display()))?;

    print_listing(&tasks);
    let batch = BatchRun::new(tasks, jobs)?;
    let handle = batch.handle();

    let socket_path = hlsbatch_core::control::default_control_socket_path().ok();
    let mut listener = None;
    if let Some(path) = &socket_path {
        match control_socket::spawn_control_listener(handle.clone(), path).await {
            Ok(task) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                listener = Some(task);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket unavailable: {:#}", e);
            }
        }
    }

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                match on_interrupt(&handle) {
                    Interrupt::Stopping => {
                        println!("Interrupted, stopping batch (press Ctrl-C again to exit now)...")
                    }
                    Interrupt::Exit(reason) => {
                        eprintln!("hlsbatch: interrupted while {}, exiting", reason.status);
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            }
        })
    };

    let runner = ProcessRunner::new(Arc::new(encoder)).with_grace(cfg.cancel_grace());
    let dispatcher = Dispatcher::new(runner).with_progress_interval(cfg.progress_interval());
    let outcome = tokio::task::spawn_blocking(move || {
        let mut presenter = ConsolePresenter::default();
        dispatcher.run(batch, &mut presenter)
    })
    .await;

    interrupt.abort();
    // Only the run that bound the socket removes it.
    if let (Some(task), Some(path)) = (listener, &socket_path) {
        task.abort();
        let _ = std::fs::remove_file(path);
    }

    let report = outcome.context("dispatcher thread")??;
    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }

    for task in report.tasks_in(TaskState::Failed) {
        eprintln!(
            "  failed: {} ({})",
            task.source_path.display(),
            task.message.as_deref().unwrap_or("no details")
        );
        for line in &task.output_tail {
            eprintln!("    | {}", line);
        }
    }

    if report.summary.failed > 0 {
        bail!("{} of {} conversion(s) failed", report.summary.failed, report.summary.batch_size);
    }
    Ok(())
}
