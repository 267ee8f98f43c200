//! CLI for the hlsbatch converter.

mod commands;
mod control_socket;
mod presenter;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlsbatch_core::config;
use std::path::PathBuf;

use commands::{run_check, run_convert, run_stop, ConvertArgs};

/// Top-level CLI for hlsbatch.
#[derive(Debug, Parser)]
#[command(name = "hlsbatch")]
#[command(about = "hlsbatch: batch video to HLS (m3u8) converter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Convert video files (or every video in the given folders) to HLS.
    Convert {
        /// Video files and/or folders to scan.
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        /// Output root; each video gets `<DIR>/<name>/`. Defaults to `output_dir` from config.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Target chunk duration in seconds.
        #[arg(long, value_name = "SECS")]
        segment: Option<u32>,

        /// Run up to N conversions at once (default: min(4, CPUs)).
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Path to the ffmpeg executable.
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<PathBuf>,

        /// Write a JSON report of the batch to FILE.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Check that ffmpeg can be found and runs.
    Check {
        /// Path to the ffmpeg executable.
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<PathBuf>,
    },

    /// Stop the batch a running `hlsbatch convert` is working on.
    Stop,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Convert {
                inputs,
                output,
                segment,
                jobs,
                ffmpeg,
                report,
            } => {
                let args = ConvertArgs {
                    inputs,
                    output,
                    segment,
                    jobs,
                    ffmpeg,
                    report,
                };
                run_convert(&cfg, args).await?;
            }
            CliCommand::Check { ffmpeg } => {
                run_check(ffmpeg.as_deref().or(cfg.ffmpeg_path.as_deref()))?
            }
            CliCommand::Stop => run_stop().await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
