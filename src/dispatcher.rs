// src/dispatcher.rs
use crate::buffer::EventBuffer;
use crate::notification::Formatter;
use crate::webhook::Notifier;
use std::time::Duration;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, error, info};

/// Result of a single dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The buffer was empty; nothing was touched.
    Idle,
    /// Events were drained but none of them are reportable.
    NothingToReport { drained: usize },
    /// A message was sent.
    Delivered { drained: usize, fields: usize },
    /// A message was built but could not be sent. The events are gone.
    Failed { drained: usize },
}

/// Runs one cycle: drain the buffer, build a message, send it.
///
/// # Arguments
/// * `buffer` - Shared buffer to drain.
/// * `formatter` - Renders the drained events into a message.
/// * `notifier` - Destination for the message.
///
/// # Returns
/// What the cycle did. Send failures are logged and reported as
/// [`DispatchOutcome::Failed`], never returned as errors.
pub async fn dispatch_once<N: Notifier + ?Sized>(
    buffer: &EventBuffer,
    formatter: &Formatter,
    notifier: &N,
) -> DispatchOutcome {
    let events = buffer.drain();
    if events.is_empty() {
        return DispatchOutcome::Idle;
    }
    let drained = events.len();

    let message = match formatter.build(&events) {
        Some(message) => message,
        None => {
            debug!("Drained {} events, none reportable", drained);
            return DispatchOutcome::NothingToReport { drained };
        }
    };
    let fields = message.field_count();

    match notifier.notify(&message).await {
        Ok(()) => {
            info!("Sent notification with {} entries ({} events)", fields, drained);
            DispatchOutcome::Delivered { drained, fields }
        }
        Err(e) => {
            error!("Failed to deliver notification: {}", e);
            DispatchOutcome::Failed { drained }
        }
    }
}

/// Dispatch loop: one cycle, then sleep for `polling`, until shutdown.
///
/// Sending happens inline, so a slow webhook delays the next cycle. When
/// shutdown is signalled, one last cycle flushes whatever is still buffered.
///
/// # Arguments
/// * `polling` - Pause between cycles.
/// * `buffer` - Shared buffer filled by the collector.
/// * `formatter` - Renders each batch into a message.
/// * `notifier` - Destination for messages.
/// * `shutdown_signal` - Watch channel for shutdown notification.
pub async fn run_dispatcher<N: Notifier>(
    polling: Duration,
    buffer: EventBuffer,
    formatter: Formatter,
    notifier: N,
    shutdown_signal: WatchReceiver<bool>,
) {
    let mut shutdown = shutdown_signal.clone();
    info!("Dispatcher started, checking every {:?}", polling);

    loop {
        dispatch_once(&buffer, &formatter, &notifier).await;

        tokio::select! {
            _ = tokio::time::sleep(polling) => {}
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Dispatcher shutting down due to signal.");
                    break;
                }
            }
        }
    }

    let outcome = dispatch_once(&buffer, &formatter, &notifier).await;
    debug!("Final dispatch cycle: {:?}", outcome);
}
