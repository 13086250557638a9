use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first interrupt or termination signal.
///
/// Handlers are registered before this returns, so a signal arriving right
/// after is not lost. The listener fires once and is not re-armed; it also
/// exits quietly if the token is cancelled some other way.
///
/// # Errors
/// Returns an error when a signal handler cannot be registered.
pub fn cancel_on_signal(token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                _ = sigterm.recv() => info!("Received SIGTERM, cancelling"),
                _ = sigint.recv() => info!("Received SIGINT, cancelling"),
            }
            token.cancel();
        }))
    }

    #[cfg(windows)]
    {
        use tokio::signal::windows;

        let mut ctrl_c = windows::ctrl_c()?;
        let mut ctrl_break = windows::ctrl_break()?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                _ = ctrl_c.recv() => info!("Received Ctrl+C, cancelling"),
                _ = ctrl_break.recv() => info!("Received Ctrl+Break, cancelling"),
            }
            token.cancel();
        }))
    }
}
