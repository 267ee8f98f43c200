//! Inspect what the encoder left in a task's output directory.

use std::fs;
use std::io;

use crate::task::TaskDescriptor;

/// Playlist and chunk files found for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputArtifacts {
    pub playlist: bool,
    pub chunks: usize,
}

impl OutputArtifacts {
    /// A usable HLS output: the playlist plus at least one chunk.
    pub fn is_complete(&self) -> bool {
        self.playlist && self.chunks > 0
    }
}

/// Looks for `<name>.m3u8` and `<name>_*.ts` in the task's output directory.
/// A missing directory counts as no output.
pub fn inspect_outputs(task: &TaskDescriptor) -> io::Result<OutputArtifacts> {
    let playlist = task.playlist_path().is_file();
    let prefix = format!("{}_", task.output_name());
    let entries = match fs::read_dir(task.output_dir()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(OutputArtifacts::default());
        }
        Err(e) => return Err(e),
    };
    let mut chunks = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".ts") && entry.path().is_file() {
            chunks += 1;
        }
    }
    Ok(OutputArtifacts { playlist, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;
    use tempfile::tempdir;

    fn task_in(dir: &std::path::Path) -> TaskDescriptor {
        TaskDescriptor::new(TaskId(1), "/v/clip.mkv", dir, 10, "clip").unwrap()
    }

    #[test]
    fn missing_dir_has_no_outputs() {
        let dir = tempdir().unwrap();
        let task = task_in(&dir.path().join("absent"));
        let found = inspect_outputs(&task).unwrap();
        assert_eq!(found, OutputArtifacts::default());
        assert!(!found.is_complete());
    }

    #[test]
    fn counts_only_matching_chunks() {
        let dir = tempdir().unwrap();
        for name in ["clip.m3u8", "clip_000.ts", "clip_001.ts", "other_000.ts", "clip_000.tmp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = inspect_outputs(&task_in(dir.path())).unwrap();
        assert!(found.playlist);
        assert_eq!(found.chunks, 2);
        assert!(found.is_complete());
    }

    #[test]
    fn playlist_without_chunks_is_incomplete() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clip.m3u8"), b"#EXTM3U").unwrap();
        let found = inspect_outputs(&task_in(dir.path())).unwrap();
        assert!(found.playlist);
        assert!(!found.is_complete());
    }
}
