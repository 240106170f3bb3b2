use tokio::sync::mpsc;

use vo_channels::Event;

use crate::error::{Result, RouterError};

/// Cloneable producer half of the router's event queue.
///
/// Every event source and the scheduler hold one; the router owns the single
/// consumer. Unbounded by design; producers are never back-pressured into
/// dropping chat events.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventQueue {
    /// Create the queue, returning the producer handle and the consumer end.
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue one event. Fails only when the router is gone.
    pub fn push(&self, event: Event) -> Result<()> {
        self.tx.send(event).map_err(|_| RouterError::QueueClosed)
    }

    /// Raw sender, for collaborators that hold their own handle (the
    /// scheduler engine).
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }
}
