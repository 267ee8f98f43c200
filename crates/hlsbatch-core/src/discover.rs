//! Input discovery and output planning.
//!
//! Turns the user's list of files and folders into an ordered, de-duplicated
//! list of video files, then into one [`TaskDescriptor`] per file.

use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::task::{TaskDescriptor, TaskId};

/// Extensions (lowercase, no dot) picked up when scanning a folder.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ts", "m2ts",
];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Expands `inputs` into video files.
///
/// Files are taken as given, whatever their extension. Folders are scanned
/// one level deep for video files, sorted by name. Order of first
/// appearance is kept and repeats are dropped. A missing input is an error.
pub fn collect_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let meta = fs::metadata(input)
            .with_context(|| format!("input not found: {}", input.display()))?;
        if meta.is_dir() {
            let found = scan_dir(input)?;
            tracing::debug!(dir = %input.display(), files = found.len(), "scanned folder");
            for file in found {
                if seen.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if seen.insert(input.to_path_buf()) {
            out.push(input.to_path_buf());
        }
    }
    Ok(out)
}

fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read folder: {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read folder: {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && is_video_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One task per input: output dir `<output_root>/<stem>`, output name
/// `<stem>`. Stems that collide get `_2`, `_3`, ... appended. Ids count from 1
/// in input order.
pub fn plan_tasks(
    inputs: &[PathBuf],
    output_root: &Path,
    segment_duration_secs: u32,
) -> Result<Vec<TaskDescriptor>> {
    if inputs.is_empty() {
        bail!("no video files found in the given inputs");
    }
    let mut used: HashMap<String, u32> = HashMap::new();
    let mut tasks = Vec::with_capacity(inputs.len());
    for (i, source) in inputs.iter().enumerate() {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "video".to_string());
        let name = unique_name(&mut used, stem);
        let id = TaskId(i as u32 + 1);
        let task = TaskDescriptor::new(
            id,
            source.clone(),
            output_root.join(&name),
            segment_duration_secs,
            name,
        )
        .with_context(|| format!("plan task for {}", source.display()))?;
        tasks.push(task);
    }
    Ok(tasks)
}

fn unique_name(used: &mut HashMap<String, u32>, stem: String) -> String {
    let mut n = match used.get(&stem) {
        None => {
            used.insert(stem.clone(), 1);
            return stem;
        }
        Some(&n) => n,
    };
    loop {
        n += 1;
        let candidate = format!("{}_{}", stem, n);
        if !used.contains_key(&candidate) {
            used.insert(stem, n);
            used.insert(candidate.clone(), 1);
            return candidate;
        }
    }
}
