//! # Termination signals for hosted executors.
//!
//! [`wait_for_shutdown_signal`] resolves on the first termination request the
//! process receives. [`BackgroundExecutor::run_until_signal`](crate::BackgroundExecutor::run_until_signal)
//! races it against the executor's root token and then runs the configured shutdown.
//!
//! | Platform | Signals                               |
//! |----------|---------------------------------------|
//! | Unix     | `SIGINT`, `SIGTERM`, `SIGQUIT`        |
//! | other    | Ctrl-C via [`tokio::signal::ctrl_c`]  |

/// Waits for SIGINT, SIGTERM or SIGQUIT.
///
/// Listeners are registered on every call; registration failure is returned as `Err`.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
