//! Inbound message fan-out to host listeners.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// A single message received on a subscribed channel. Forwarded to
/// listeners exactly as it arrived from the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// Forwards every inbound message to all registered listeners.
///
/// No filtering against the subscription set: the broker only delivers
/// messages for channels actually subscribed. Delivery awaits each
/// listener's channel capacity, so a stalled listener stalls subsequent
/// deliveries; listeners must drain promptly or hand off.
#[derive(Clone, Default)]
pub struct MessageRouter {
    listeners: Arc<Mutex<Vec<mpsc::Sender<InboundMessage>>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for inbound messages
    pub async fn add_listener(&self, listener: mpsc::Sender<InboundMessage>) {
        self.listeners.lock().await.push(listener);
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }

    /// Deliver `message` to every registered listener, pruning listeners
    /// whose receiver has been dropped.
    pub async fn deliver(&self, message: InboundMessage) {
        let mut listeners = self.listeners.lock().await;

        if listeners.is_empty() {
            warn!(
                channel = %message.channel,
                "inbound message dropped, no listener registered"
            );
            return;
        }

        let mut any_closed = false;
        for listener in listeners.iter() {
            if listener.send(message.clone()).await.is_err() {
                any_closed = true;
            }
        }

        if any_closed {
            listeners.retain(|l| !l.is_closed());
            debug!(
                remaining = listeners.len(),
                "pruned closed message listeners"
            );
        }
    }
}
