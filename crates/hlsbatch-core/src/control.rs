//! Batch control: shared cancellation token and the control socket location.
//!
//! The dispatcher hands one `CancelToken` to every runner of a batch. A stop
//! request (Ctrl-C, `hlsbatch stop` via the control socket) cancels the token;
//! runners polling it terminate their encoder process.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Default path for the control socket (same XDG state dir as the log).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("hlsbatch")?.get_state_home();
    Ok(dir.join("control.sock"))
}
