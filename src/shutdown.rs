use std::future::Future;
use tokio::sync::watch;
use tracing::{info, warn};

/// Spawns a task that flips the returned receiver to `true` once `signal`
/// resolves successfully.
///
/// If the signal listener fails, the sender is kept alive forever so the
/// sync loop keeps running until the process is killed.
pub fn forward_shutdown<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl-C, polling until killed: {}", e);
                // Dropping the sender would stop the loop.
                let _keep_alive = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    shutdown_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_requests_shutdown() {
        let mut rx = forward_shutdown(async { Ok(()) });
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_listener_failure_keeps_loop_running() {
        let mut rx = forward_shutdown(async { Err(std::io::Error::other("no signal support")) });

        // Neither a value change nor a dropped sender may show up.
        let waited = tokio::time::timeout(Duration::from_millis(100), rx.changed()).await;
        assert!(waited.is_err());
        assert!(!*rx.borrow());
    }
}
