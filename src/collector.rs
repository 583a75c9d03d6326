// src/collector.rs
use crate::buffer::EventBuffer;
use crate::error::WatchError;
use crate::watcher::WatcherMessage;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, info};

/// Moves events from the watcher channel into the shared buffer.
///
/// Events are appended unmodified and in arrival order. Watcher errors are
/// not retried; the caller is expected to treat them as fatal.
///
/// # Arguments
/// * `watcher_rx` - Receiver returned by [`start_watcher`](crate::watcher::start_watcher).
/// * `buffer` - Shared buffer the dispatcher drains.
/// * `shutdown_signal` - Watch channel for shutdown notification.
///
/// # Returns
/// `Ok(())` when the watcher channel closes or shutdown is signalled.
///
/// # Errors
/// Returns the first [`WatchError`] the watcher reports.
pub async fn run_collector(
    mut watcher_rx: Receiver<WatcherMessage>,
    buffer: EventBuffer,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<(), WatchError> {
    let mut shutdown = shutdown_signal.clone();

    loop {
        tokio::select! {
            message = watcher_rx.recv() => {
                match message {
                    Some(WatcherMessage::Event(event)) => {
                        debug!("Collector buffered event: {:?}", event);
                        buffer.push(event);
                    }
                    Some(WatcherMessage::Error(e)) => return Err(e),
                    None => {
                        info!("Watcher channel closed. Collector exiting.");
                        break;
                    }
                }
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Collector shutting down due to signal.");
                    break;
                }
            }
        }
    }
    Ok(())
}
