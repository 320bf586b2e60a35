//! Forwarding seam between this core and the pipeline's wiring.
//!
//! Routing between stages is an external collaborator; the core only hands a
//! fully formed outbound message plus a destination output port to whatever
//! implements [`Forwarder`]. Delivery is at-least-once and local.

use crate::message::Message;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

/// Trait for the external delivery collaborator.
pub trait Forwarder: Send + Sync {
    /// Delivers `message` on the given output port.
    fn forward(&self, message: Message, port: usize);
}

/// A forwarder that discards everything.
///
/// Used as the default when a stage or dispatcher has no wired outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpForwarder;

impl Forwarder for NoOpForwarder {
    fn forward(&self, _message: Message, _port: usize) {
        // Intentionally empty - discards all messages
    }
}

/// A forwarder that records every delivery, for testing.
#[derive(Debug, Default)]
pub struct CollectingForwarder {
    messages: RwLock<Vec<(Message, usize)>>,
}

impl CollectingForwarder {
    /// Creates a new collecting forwarder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded deliveries.
    #[must_use]
    pub fn messages(&self) -> Vec<(Message, usize)> {
        self.messages.read().clone()
    }

    /// Returns the messages delivered on a specific port.
    #[must_use]
    pub fn messages_on(&self, port: usize) -> Vec<Message> {
        self.messages
            .read()
            .iter()
            .filter(|(_, p)| *p == port)
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// Returns the number of recorded deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Returns true if nothing has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Clears all recorded deliveries.
    pub fn clear(&self) {
        self.messages.write().clear();
    }
}

impl Forwarder for CollectingForwarder {
    fn forward(&self, message: Message, port: usize) {
        self.messages.write().push((message, port));
    }
}

/// A forwarder that delivers into a Tokio channel, the natural wiring
/// adapter for an event-loop runtime.
#[derive(Debug, Clone)]
pub struct ChannelForwarder {
    sender: mpsc::UnboundedSender<(Message, usize)>,
}

impl ChannelForwarder {
    /// Creates a forwarder and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Message, usize)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Forwarder for ChannelForwarder {
    fn forward(&self, message: Message, port: usize) {
        if self.sender.send((message, port)).is_err() {
            warn!(port, "channel forwarder receiver dropped; message discarded");
        }
    }
}
