//! `hlsbatch check` – verify that ffmpeg is present and runs.

use anyhow::{Context, Result};
use hlsbatch_core::encoder::FfmpegEncoder;
use std::path::Path;

pub fn run_check(ffmpeg: Option<&Path>) -> Result<()> {
    let encoder = FfmpegEncoder::discover(ffmpeg);
    let version = encoder
        .check()
        .with_context(|| format!("ffmpeg check failed for {}", encoder.path().display()))?;
    println!("ffmpeg: {}", encoder.path().display());
    println!("{}", version);
    Ok(())
}
