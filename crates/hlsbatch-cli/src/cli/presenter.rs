//! Console presenter: one line per log message, a progress line when the
//! counters move, and the file listing printed before a batch starts.

use hlsbatch_core::presenter::Presenter;
use hlsbatch_core::progress::{BatchSummary, ProgressSnapshot};
use hlsbatch_core::task::{TaskDescriptor, TaskId};

/// Human-readable size with one decimal: `512.0 B`, `1.5 MB`, `2.0 TB`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Prints the tasks about to run with their source sizes.
pub fn print_listing(tasks: &[TaskDescriptor]) {
    println!("{:<5} {:>10}  {:<40} {}", "ID", "SIZE", "SOURCE", "OUTPUT");
    for t in tasks {
        let size = std::fs::metadata(t.source_path())
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "{:<5} {:>10}  {:<40} {}",
            t.id().0,
            size,
            t.display_name(),
            t.playlist_path().display()
        );
    }
}

#[derive(Debug, Default)]
pub struct ConsolePresenter {
    last: Option<ProgressSnapshot>,
}

impl Presenter for ConsolePresenter {
    fn on_progress(&mut self, s: &ProgressSnapshot) {
        let moved = self
            .last
            .map(|l| (l.completed, l.running) != (s.completed, s.running))
            .unwrap_or(true);
        if moved {
            println!(
                "  progress: {}/{} done ({:.0}%), {} running",
                s.completed,
                s.total,
                s.fraction() * 100.0,
                s.running
            );
        }
        self.last = Some(*s);
    }

    fn on_batch_finished(&mut self, s: &BatchSummary) {
        println!();
        println!(
            "Done: {} succeeded, {} failed, {} cancelled, {} not run ({} total)",
            s.succeeded, s.failed, s.cancelled, s.not_run, s.batch_size
        );
    }

    fn on_log(&mut self, message: &str, _task: Option<TaskId>) {
        println!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536 * 1024), "1.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_size(2 * 1024u64.pow(4)), "2.0 TB");
    }
}
