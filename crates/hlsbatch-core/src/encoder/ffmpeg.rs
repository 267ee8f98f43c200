//! ffmpeg HLS encoder: stream-copy remux into `<name>.m3u8` + `<name>_NNN.ts`.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

use super::Encoder;
use crate::task::TaskDescriptor;

/// Why `ffmpeg -version` did not confirm a working encoder.
#[derive(Debug, Error)]
pub enum EncoderCheckError {
    #[error("ffmpeg not found at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to run {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} -version exited with {status}", path.display())]
    BadStatus { path: PathBuf, status: String },
}

/// Encoder that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    path: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses [`locate_ffmpeg`] to pick the executable.
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self::new(locate_ffmpeg(explicit))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Argument list for one task (without the program name).
    pub fn args(&self, task: &TaskDescriptor) -> Vec<OsString> {
        let chunk_pattern = task
            .output_dir()
            .join(format!("{}_%03d.ts", task.output_name()));
        let mut args: Vec<OsString> = Vec::with_capacity(20);
        args.push("-i".into());
        args.push(task.source_path().into());
        for a in ["-c", "copy", "-f", "hls", "-hls_time"] {
            args.push(a.into());
        }
        args.push(task.segment_duration_secs().to_string().into());
        for a in ["-hls_list_size", "0", "-hls_segment_filename"] {
            args.push(a.into());
        }
        args.push(chunk_pattern.into());
        for a in ["-avoid_negative_ts", "make_zero", "-fflags", "+genpts", "-y"] {
            args.push(a.into());
        }
        args.push(task.playlist_path().into());
        args
    }

    /// Runs `<ffmpeg> -version` and returns its first output line.
    pub fn check(&self) -> Result<String, EncoderCheckError> {
        let output = Command::new(&self.path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    EncoderCheckError::NotFound {
                        path: self.path.clone(),
                    }
                } else {
                    EncoderCheckError::Launch {
                        path: self.path.clone(),
                        source: e,
                    }
                }
            })?;
        if !output.status.success() {
            return Err(EncoderCheckError::BadStatus {
                path: self.path.clone(),
                status: output.status.to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or("ffmpeg").trim().to_string())
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn command(&self, task: &TaskDescriptor) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(self.args(task));
        cmd
    }
}

fn ffmpeg_file_name() -> String {
    format!("ffmpeg{}", env::consts::EXE_SUFFIX)
}

/// Picks the ffmpeg executable: `explicit` if given, else one shipped next
/// to the running binary (or in its `resources/` dir), else the first match
/// on `PATH`, else plain `ffmpeg` and let the spawn report it missing.
pub fn locate_ffmpeg(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let file_name = ffmpeg_file_name();
    if let Some(exe_dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        for candidate in [exe_dir.join(&file_name), exe_dir.join("resources").join(&file_name)] {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "using bundled ffmpeg");
                return candidate;
            }
        }
    }
    if let Some(found) = search_path(&file_name) {
        return found;
    }
    PathBuf::from(file_name)
}

fn search_path(file_name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    fn task() -> TaskDescriptor {
        TaskDescriptor::new(TaskId(3), "/in/movie.mp4", "/out/movie", 6, "movie").unwrap()
    }

    #[test]
    fn args_describe_hls_stream_copy() {
        let enc = FfmpegEncoder::new("/usr/bin/ffmpeg");
        let args: Vec<String> = enc
            .args(&task())
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "/in/movie.mp4");
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-hls_time") + 1], "6");
        assert_eq!(args[pos("-hls_list_size") + 1], "0");
        assert_eq!(args[pos("-f") + 1], "hls");
        assert_eq!(args[pos("-c") + 1], "copy");
        assert_eq!(
            args[pos("-hls_segment_filename") + 1],
            "/out/movie/movie_%03d.ts"
        );
        assert_eq!(args.last().unwrap(), "/out/movie/movie.m3u8");
    }

    #[test]
    fn command_uses_configured_program() {
        let enc = FfmpegEncoder::new("/opt/ff/ffmpeg");
        let cmd = enc.command(&task());
        assert_eq!(cmd.get_program(), "/opt/ff/ffmpeg");
        assert_eq!(enc.name(), "ffmpeg");
    }

    #[test]
    fn explicit_path_wins() {
        let p = locate_ffmpeg(Some(Path::new("/custom/ffmpeg")));
        assert_eq!(p, PathBuf::from("/custom/ffmpeg"));
    }

    #[test]
    fn check_reports_missing_binary() {
        let enc = FfmpegEncoder::new("/definitely/not/here/ffmpeg");
        assert!(matches!(enc.check(), Err(EncoderCheckError::NotFound { .. })));
    }
}
