//! # Dispatch Tests for Hookwatch
//!
//! Exercises the buffer, the single-cycle dispatcher, the dispatch loop and
//! the HTTP webhook client against an in-process capture server.
//!
//! ## Test Overview
//!
//! - **test_buffer_drain_is_idempotent**: Draining an empty buffer changes nothing.
//! - **test_buffer_concurrent_push_and_drain**: No event is lost or duplicated.
//! - **test_dispatch_idle_sends_nothing**: Empty buffer, no webhook call.
//! - **test_dispatch_directory_only_batch**: Non-reportable batches are drained without a call.
//! - **test_dispatch_delivers_and_clears**: One message per cycle, buffer emptied.
//! - **test_dispatch_failure_is_swallowed**: Send errors are reported, not raised.
//! - **test_dispatcher_loop_delivers_until_shutdown**: Loop picks up events and stops on signal.
//! - **test_dispatcher_final_cycle_delivers_pending**: Final cycle on shutdown.
//! - **test_webhook_client_posts_json**: POST body and content type.
//! - **test_dispatch_through_webhook_client**: One real POST per cycle.
//! - **test_webhook_client_ignores_error_status**: Non-2xx counts as delivered.
//! - **test_webhook_client_unreachable**: Connection failure is an error.

use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Router};
use hookwatch::buffer::EventBuffer;
use hookwatch::dispatcher::{dispatch_once, run_dispatcher, DispatchOutcome};
use hookwatch::error::TransportError;
use hookwatch::event::RawEvent;
use hookwatch::notification::{Formatter, WebhookMessage};
use hookwatch::webhook::{Notifier, WebhookClient};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Duration};

/// Short timeout for waits on async work.
const SHORT_TIMEOUT: Duration = Duration::from_secs(5);

/// A request seen by the capture server: content type and raw body.
type Captured = (Option<String>, String);

/// Records every message instead of sending it.
#[derive(Default, Clone)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<WebhookMessage>>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<WebhookMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Always fails with a serialization error.
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _message: &WebhookMessage) -> Result<(), TransportError> {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        Err(TransportError::Serialize(err))
    }
}

fn formatter() -> Formatter {
    Formatter::new("/data", None)
}

async fn capture(
    State(tx): State<mpsc::UnboundedSender<Captured>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let _ = tx.send((content_type, body));
    StatusCode::NO_CONTENT
}

/// Starts a webhook capture server on a random local port.
///
/// Returns the hook URL and a receiver yielding each captured request.
async fn start_capture_server(
    status: Option<StatusCode>,
) -> (String, mpsc::UnboundedReceiver<Captured>) {
    let (tx, rx) = mpsc::unbounded_channel::<Captured>();
    let app = match status {
        None => Router::new().route("/hook", post(capture)).with_state(tx),
        Some(code) => Router::new()
            .route(
                "/hook",
                post(move |State(tx): State<mpsc::UnboundedSender<Captured>>, body: String| async move {
                    let _ = tx.send((None, body));
                    code
                }),
            )
            .with_state(tx),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind capture server");
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{}/hook", addr), rx)
}

/// Test: Draining an empty buffer twice produces nothing and leaves it empty.
#[test]
fn test_buffer_drain_is_idempotent() {
    let buffer = EventBuffer::new();
    assert!(buffer.drain().is_empty());
    assert!(buffer.drain().is_empty());
    assert!(buffer.is_empty());

    buffer.push(RawEvent::created("/data/a", false));
    buffer.push(RawEvent::removed("/data/b", false));
    let drained = buffer.drain();
    assert_eq!(drained[0].path.to_str(), Some("/data/a"));
    assert_eq!(drained[1].path.to_str(), Some("/data/b"));
    assert_eq!(buffer.len(), 0);
}

/// Test: Concurrent producers and a draining consumer see every event exactly once.
#[test]
fn test_buffer_concurrent_push_and_drain() {
    let buffer = EventBuffer::new();
    let producers: Vec<_> = (0..4)
        .map(|t| {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    buffer.push(RawEvent::created(format!("/data/{}-{}", t, i), false));
                }
            })
        })
        .collect();

    let mut seen = Vec::new();
    while producers.iter().any(|p| !p.is_finished()) {
        seen.extend(buffer.drain());
    }
    for p in producers {
        p.join().unwrap();
    }
    seen.extend(buffer.drain());

    assert_eq!(seen.len(), 2000);
    let unique: std::collections::HashSet<_> = seen.iter().map(|e| e.path.clone()).collect();
    assert_eq!(unique.len(), 2000);
}

/// Test: An idle cycle issues no webhook call, twice in a row.
#[tokio::test]
async fn test_dispatch_idle_sends_nothing() {
    let buffer = EventBuffer::new();
    let notifier = RecordingNotifier::default();

    assert_eq!(
        dispatch_once(&buffer, &formatter(), &notifier).await,
        DispatchOutcome::Idle
    );
    assert_eq!(
        dispatch_once(&buffer, &formatter(), &notifier).await,
        DispatchOutcome::Idle
    );
    assert!(notifier.sent().is_empty());
}

/// Test: Non-reportable events are drained without sending.
#[tokio::test]
async fn test_dispatch_directory_only_batch() {
    let buffer = EventBuffer::new();
    buffer.push(RawEvent::created("/data/dir", true));
    buffer.push(RawEvent::other("/data/file.txt", false));
    let notifier = RecordingNotifier::default();

    assert_eq!(
        dispatch_once(&buffer, &formatter(), &notifier).await,
        DispatchOutcome::NothingToReport { drained: 2 }
    );
    assert!(notifier.sent().is_empty());
    assert!(buffer.is_empty());
}

/// Test: A batch becomes exactly one message and the buffer is cleared.
#[tokio::test]
async fn test_dispatch_delivers_and_clears() {
    let buffer = EventBuffer::new();
    buffer.push(RawEvent::created("/data/a.txt", false));
    buffer.push(RawEvent::removed("/data/b.txt", false));
    buffer.push(RawEvent::created("/data/sub", true));
    let notifier = RecordingNotifier::default();

    let outcome = dispatch_once(&buffer, &formatter(), &notifier).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Delivered {
            drained: 3,
            fields: 2
        }
    );
    assert!(buffer.is_empty());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].embeds.len(), 2);

    assert_eq!(
        dispatch_once(&buffer, &formatter(), &notifier).await,
        DispatchOutcome::Idle
    );
    assert_eq!(notifier.sent().len(), 1);
}

/// Test: A failed send is logged and the cycle still completes.
#[tokio::test]
async fn test_dispatch_failure_is_swallowed() {
    let buffer = EventBuffer::new();
    buffer.push(RawEvent::created("/data/a.txt", false));

    assert_eq!(
        dispatch_once(&buffer, &formatter(), &FailingNotifier).await,
        DispatchOutcome::Failed { drained: 1 }
    );
    assert!(buffer.is_empty());
    assert_eq!(
        dispatch_once(&buffer, &formatter(), &FailingNotifier).await,
        DispatchOutcome::Idle
    );
}

/// Test: The loop picks up new events and stops on shutdown.
#[tokio::test]
async fn test_dispatcher_loop_delivers_until_shutdown() {
    let buffer = EventBuffer::new();
    let notifier = RecordingNotifier::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_dispatcher(
        Duration::from_millis(50),
        buffer.clone(),
        formatter(),
        notifier.clone(),
        shutdown_rx,
    ));

    buffer.push(RawEvent::created("/data/first.txt", false));
    timeout(SHORT_TIMEOUT, async {
        while notifier.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dispatcher never delivered the first batch");

    shutdown_tx.send(true).unwrap();
    timeout(SHORT_TIMEOUT, handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].embeds[0].fields[0].name, "first.txt");
}

/// Test: Events buffered while the loop sleeps are delivered by the final cycle.
#[tokio::test]
async fn test_dispatcher_final_cycle_delivers_pending() {
    let buffer = EventBuffer::new();
    let notifier = RecordingNotifier::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    buffer.push(RawEvent::created("/data/pending.txt", false));
    let handle = tokio::spawn(run_dispatcher(
        Duration::from_secs(3600),
        buffer.clone(),
        formatter(),
        notifier.clone(),
        shutdown_rx,
    ));
    shutdown_tx.send(true).unwrap();
    timeout(SHORT_TIMEOUT, handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].embeds[0].fields[0].name, "pending.txt");
    assert!(buffer.is_empty());
}

/// Test: The webhook client posts the serialized message as JSON.
#[tokio::test]
async fn test_webhook_client_posts_json() {
    let (url, mut rx) = start_capture_server(None).await;
    let client = WebhookClient::new(url);

    let message = formatter()
        .build(&[RawEvent::created("/data/a.txt", false)])
        .unwrap();
    client.notify(&message).await.expect("post should succeed");

    let (content_type, body) = timeout(SHORT_TIMEOUT, rx.recv())
        .await
        .expect("no request captured")
        .unwrap();
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let received: WebhookMessage = serde_json::from_str(&body).unwrap();
    assert_eq!(received, message);
}

/// Test: Dispatching through the real client reaches the server once.
#[tokio::test]
async fn test_dispatch_through_webhook_client() {
    let (url, mut rx) = start_capture_server(None).await;
    let client = WebhookClient::new(url);
    let buffer = EventBuffer::new();
    buffer.push(RawEvent::relocated("/data/c.txt", "/data/moved/d.txt", false));

    let outcome = dispatch_once(&buffer, &formatter(), &client).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Delivered {
            drained: 1,
            fields: 1
        }
    );

    let (_, body) = timeout(SHORT_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["embeds"][0]["title"], "Changes");
    assert_eq!(
        value["embeds"][0]["fields"][0]["value"],
        "Move from `c.txt` to `moved/d.txt`"
    );
    assert!(rx.try_recv().is_err());
}

/// Test: An error status from the webhook is not treated as a failure.
#[tokio::test]
async fn test_webhook_client_ignores_error_status() {
    let (url, mut rx) = start_capture_server(Some(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let client = WebhookClient::new(url);
    let message = formatter()
        .build(&[RawEvent::removed("/data/b.txt", false)])
        .unwrap();

    assert!(client.notify(&message).await.is_ok());
    assert!(timeout(SHORT_TIMEOUT, rx.recv()).await.unwrap().is_some());
}

/// Test: An unreachable webhook yields a request error.
#[tokio::test]
async fn test_webhook_client_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = WebhookClient::new(format!("http://127.0.0.1:{}/hook", port));
    let message = formatter()
        .build(&[RawEvent::created("/data/a.txt", false)])
        .unwrap();

    match client.notify(&message).await {
        Err(TransportError::Request(_)) => {}
        other => panic!("expected request error, got {:?}", other),
    }
}
