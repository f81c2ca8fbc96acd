//! Process shutdown signalling: waits for `SIGINT`/`SIGTERM` so the listener
//! loop can break cleanly.

use std::io;

/// Resolves once the process has been asked to shut down. In-flight
/// connection tasks are not explicitly drained; they are simply dropped
/// once the process exits.
#[cfg(unix)]
pub async fn wait_for_shutdown() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl-C, shutting down");
    Ok(())
}
