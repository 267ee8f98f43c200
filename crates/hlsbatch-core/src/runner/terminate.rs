//! Terminate-then-kill escalation for a cancelled encoder.
//!
//! Encoders are spawned as process-group leaders, so signals go to the whole
//! group: anything the encoder started (wrapper scripts, helpers) ends with it.

use std::io;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use super::POLL_INTERVAL;

/// How a cancelled process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Termination {
    /// Exited within the grace period after SIGTERM.
    Graceful(ExitStatus),
    /// Still alive after the grace period (or no graceful signal available); killed.
    Killed(ExitStatus),
}

/// Sends `signal` to the process group led by `child`. A group that is
/// already gone counts as delivered.
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    let r = unsafe { libc::kill(-pgid, signal) };
    if r == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Sends SIGTERM so ffmpeg can close its outputs.
fn request_termination(child: &Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        signal_group(child, libc::SIGTERM)
    }
    #[cfg(not(unix))]
    {
        let _ = child;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "graceful termination not available on this platform",
        ))
    }
}

/// SIGKILL to the group, falling back to killing the leader alone.
fn kill_all(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Err(e) = signal_group(child, libc::SIGKILL) {
            tracing::debug!(pid = child.id(), "group kill failed: {}", e);
        } else {
            return Ok(());
        }
    }
    match child.kill() {
        // InvalidInput: the leader already exited; wait() reaps it.
        Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
        _ => Ok(()),
    }
}

/// SIGTERM to the group, wait up to `grace` for the leader, then SIGKILL.
/// Always reaps the leader; stragglers left in the group are killed too.
pub(super) fn terminate_with_grace(child: &mut Child, grace: Duration) -> io::Result<Termination> {
    match request_termination(child) {
        Ok(()) => {
            let deadline = Instant::now() + grace;
            loop {
                if let Some(status) = child.try_wait()? {
                    // The leader left; do not let anything it started outlive it.
                    #[cfg(unix)]
                    let _ = signal_group(child, libc::SIGKILL);
                    return Ok(Termination::Graceful(status));
                }
                if Instant::now() >= deadline {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL.min(grace));
            }
            tracing::debug!(pid = child.id(), "grace period elapsed, killing encoder");
        }
        Err(e) => {
            tracing::debug!(pid = child.id(), "terminate request failed: {}", e);
        }
    }
    kill_all(child)?;
    let status = child.wait()?;
    Ok(Termination::Killed(status))
}
