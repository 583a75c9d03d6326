// src/buffer.rs
use crate::event::RawEvent;
use parking_lot::Mutex;
use std::sync::Arc;

/// Ordered buffer shared by the collector (appends) and the dispatcher (drains).
///
/// Cloning yields another handle to the same buffer. Append and drain take the
/// same lock, so an event is either in the drained batch or still buffered,
/// never both and never neither.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    inner: Arc<Mutex<Vec<RawEvent>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event, preserving arrival order.
    pub fn push(&self, event: RawEvent) {
        self.inner.lock().push(event);
    }

    /// Takes every buffered event and leaves the buffer empty.
    pub fn drain(&self) -> Vec<RawEvent> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
