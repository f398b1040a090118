//! Process signals, translated into [`Control`] messages.

use crate::Control;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::info;

/// Listen for process signals and forward them to the supervisor.
///
/// SIGINT and SIGTERM become [`Control::Shutdown`], SIGHUP becomes
/// [`Control::Reload`]. Handlers are installed before this returns, so a
/// signal that arrives afterwards is never lost to the default disposition.
/// The task exits once the supervisor drops its receiver.
#[cfg(unix)]
pub fn spawn_signal_listener(control: mpsc::Sender<Control>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = terminate.recv() => {
                    info!("received SIGTERM");
                    Control::Shutdown
                }
                _ = interrupt.recv() => {
                    info!("received SIGINT");
                    Control::Shutdown
                }
                _ = hangup.recv() => {
                    info!("received SIGHUP");
                    Control::Reload
                }
            };

            if control.send(msg).await.is_err() {
                break;
            }
        }
    }))
}

/// Listen for Ctrl-C and forward it to the supervisor as a shutdown.
#[cfg(not(unix))]
pub fn spawn_signal_listener(control: mpsc::Sender<Control>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C");
            if control.send(Control::Shutdown).await.is_err() {
                break;
            }
        }
    }))
}
