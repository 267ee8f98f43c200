//! `hlsbatch stop` – ask a running `hlsbatch convert` to stop its batch.

use anyhow::{bail, Result};

use crate::cli::control_socket;

pub async fn run_stop() -> Result<()> {
    let path = hlsbatch_core::control::default_control_socket_path()?;
    match control_socket::send_stop(&path).await? {
        Some(reply) if reply == "ok" => println!("Stop requested."),
        Some(reply) => {
            let reason = reply.strip_prefix("rejected: ").unwrap_or(&reply);
            bail!("stop rejected: {}", reason);
        }
        None => println!("No running batch."),
    }
    Ok(())
}
