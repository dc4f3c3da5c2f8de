//! Event stream types delivered by raw connections.
//!
//! A raw connection reports everything that happens on its wire through a
//! single channel of [`ConnectionUpdate`]s; the session supervisor is the
//! sole consumer.

/// Which half of the connection pair a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// Dedicated to SUBSCRIBE traffic and inbound messages
    Inbound,
    /// Dedicated to PUBLISH and other outbound commands
    Outbound,
}

impl ConnectionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionRole::Inbound => "inbound",
            ConnectionRole::Outbound => "outbound",
        }
    }
}

/// Notification delivered by a raw connection from its I/O context
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The broker session is established and ready for commands
    Connected,
    /// The broker session dropped
    Disconnected { reason: String },
    /// The broker acknowledged a SUBSCRIBE
    SubscribeAck { channel: String },
    /// A message arrived on a subscribed channel
    Message { channel: String, payload: String },
    /// Keepalive pong from the broker
    Pong,
}

/// A connection event tagged with the role it originated from
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionUpdate {
    pub role: ConnectionRole,
    pub event: ConnectionEvent,
}

impl ConnectionUpdate {
    pub fn new(role: ConnectionRole, event: ConnectionEvent) -> Self {
        Self { role, event }
    }
}
