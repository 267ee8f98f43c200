//! Per-task failure causes. Each one fails a single task; none aborts the batch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The encoder process could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("source file not found: {}", path.display())]
    SourceMissing { path: PathBuf },
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encoder executable not found: {program}")]
    NotFound { program: String },
    #[error("permission denied launching {program}")]
    PermissionDenied { program: String },
    #[error("failed to launch {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    pub(crate) fn from_io(program: String, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => SpawnError::NotFound { program },
            io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied { program },
            _ => SpawnError::Io { program, source: e },
        }
    }
}

/// The encoder ran but did not produce a usable result.
#[derive(Debug, Error)]
pub enum ProcessFailure {
    #[error("encoder failed: nonzero exit ({status})")]
    NonZeroExit { status: String },
    #[error("encoder exited 0 but expected outputs are missing (playlist: {playlist}, chunks: {chunks})")]
    MissingOutputs { playlist: bool, chunks: usize },
    #[error("lost track of encoder process: {0}")]
    Wait(#[source] io::Error),
    #[error("cannot inspect encoder outputs: {0}")]
    Inspect(#[source] io::Error),
}
