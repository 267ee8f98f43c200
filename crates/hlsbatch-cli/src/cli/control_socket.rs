//! Control socket: server (during `hlsbatch convert`) and client (for `hlsbatch stop`).
//! Protocol: one command per line; the only command is "stop". Each command
//! gets one reply line: "ok" or "rejected: <reason>".

use anyhow::{bail, Result};
use hlsbatch_core::dispatcher::BatchHandle;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Reply to one command line.
fn reply_to(handle: &BatchHandle, line: &str) -> String {
    match line.trim() {
        "stop" => match handle.stop() {
            Ok(()) => {
                tracing::info!("stop received on control socket");
                "ok".to_string()
            }
            Err(e) => {
                tracing::debug!("control socket stop: {}", e);
                format!("rejected: {}", e)
            }
        },
        other => format!("rejected: unknown command {:?}", other),
    }
}

/// Binds `path` and spawns a task answering "stop" lines with
/// `handle.stop()`. Fails if another batch is already listening there; a
/// stale socket file is replaced.
pub async fn spawn_control_listener(
    handle: BatchHandle,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if path.exists() {
        if UnixStream::connect(&path).await.is_ok() {
            bail!(
                "another batch is already listening on {}",
                path.display()
            );
        }
        let _ = std::fs::remove_file(&path);
    }
    let listener = UnixListener::bind(&path)?;
    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let reply = reply_to(&handle, &line);
                            if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(task)
}

/// Sends "stop" to the control socket and returns the listener's reply.
/// `None` when no batch is listening (socket missing or stale).
pub async fn send_stop(socket_path: &Path) -> Result<Option<String>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
            return Ok(None)
        }
        Err(e) => return Err(e.into()),
    };
    let (read, mut write) = stream.into_split();
    write.write_all(b"stop\n").await?;
    write.shutdown().await?;
    let reply = BufReader::new(read).lines().next_line().await?;
    Ok(Some(
        reply.unwrap_or_else(|| "rejected: listener closed without reply".to_string()),
    ))
}
