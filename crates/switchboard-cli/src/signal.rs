//! Termination signals for `serve`.
//!
//! On unix `SIGINT`, `SIGTERM` and `SIGQUIT` all end the session. Elsewhere
//! only Ctrl-C does.

/// Wait until the process is asked to stop.
///
/// # Errors
///
/// Returns an error if a signal listener cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Wait until the process is asked to stop.
///
/// # Errors
///
/// Returns an error if the Ctrl-C listener cannot be registered.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
