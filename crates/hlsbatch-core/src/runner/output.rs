//! Combined stdout/stderr capture, kept as a bounded tail for diagnostics.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Longest line kept whole; longer output is split at this length.
const MAX_LINE_BYTES: usize = 4096;

/// Last `cap` non-empty output lines of a process, shared by its reader threads.
#[derive(Debug, Clone)]
pub(super) struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    cap: usize,
}

impl OutputTail {
    pub(super) fn new(cap: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(cap))),
            cap: cap.max(1),
        }
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.cap {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub(super) fn snapshot(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    fn push_bytes(&self, bytes: &[u8]) {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim();
        if !line.is_empty() {
            self.push(line.to_string());
        }
    }

    /// Reads `reader` on a detached thread until EOF. ffmpeg redraws its
    /// status line with `\r`, so both `\r` and `\n` end a line. A line longer
    /// than `MAX_LINE_BYTES` is cut there, keeping memory bounded.
    pub(super) fn capture<R: Read + Send + 'static>(&self, reader: R) -> JoinHandle<()> {
        let tail = self.clone();
        std::thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut line: Vec<u8> = Vec::new();
            loop {
                let chunk = match reader.fill_buf() {
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Ok([]) | Err(_) => break,
                    Ok(chunk) => chunk,
                };
                for &b in chunk {
                    if b == b'\r' || b == b'\n' {
                        tail.push_bytes(&line);
                        line.clear();
                    } else {
                        line.push(b);
                        if line.len() >= MAX_LINE_BYTES {
                            tail.push_bytes(&line);
                            line.clear();
                        }
                    }
                }
                let used = chunk.len();
                reader.consume(used);
            }
            tail.push_bytes(&line);
        })
    }
}

/// Gives reader threads a moment to drain after the process exited. A
/// grandchild holding the pipe open must not block the worker, so readers
/// are never joined unconditionally.
pub(super) fn settle(readers: Vec<JoinHandle<()>>, within: Duration) {
    let deadline = Instant::now() + within;
    let mut pending = readers;
    while !pending.is_empty() && Instant::now() < deadline {
        pending.retain(|h| !h.is_finished());
        std::thread::sleep(Duration::from_millis(5));
    }
    for handle in pending.into_iter().filter(|h| h.is_finished()) {
        let _ = handle.join();
    }
}
