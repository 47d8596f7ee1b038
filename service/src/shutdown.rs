//! Process termination trigger.
//!
//! [`watch_terminate`] hands out a receiver that resolves on the first
//! SIGINT/SIGTERM (Ctrl-C on non-Unix platforms). A second signal while the
//! graceful shutdown is still running exits the process immediately.

use log::*;
use tokio::sync::oneshot;

pub fn watch_terminate() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!("Failed to listen for termination signals: {e}");
            // Keep the sender alive so the receiver never reports a signal.
            let _tx = tx;
            std::future::pending::<()>().await;
            return;
        }

        info!("Shut down signal received");
        let _ = tx.send(());

        if wait_for_signal().await.is_ok() {
            error!("Termination requested twice, force exiting");
            std::process::exit(1);
        }
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
