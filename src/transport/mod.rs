//! Transport seam for raw broker connections.
//!
//! The wire protocol is not implemented in this crate. Hosts provide a
//! [`Connector`] that opens [`RawConnection`]s for the session's two roles;
//! each connection reports its lifecycle and inbound traffic through the
//! event channel it was opened with. `testing::MockConnector` implements the
//! same seam for tests.

pub mod events;
pub mod state;

pub use events::{ConnectionEvent, ConnectionRole, ConnectionUpdate};
pub use state::ConnectionState;

use crate::uri::ConnectionConfig;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Reply values returned by the generic command primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(String),
    Array(Vec<Reply>),
    Error(String),
    Nil,
}

impl Reply {
    /// Broker-level error carried by this reply, if any. Command replies
    /// that arrive as arrays report the error in their first element.
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Reply::Error(detail) => Some(detail),
            Reply::Array(items) => items.first().and_then(Reply::error_detail),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_detail().is_some()
    }
}

/// A single broker session owned by the connection pair.
///
/// `connect` only initiates establishment: completion or failure arrives as
/// a [`ConnectionEvent`] on the channel the connection was opened with, and
/// the same call is re-issued by the supervisor to recover a dropped
/// session. `subscribe` puts the session into subscription traffic for the
/// given channel; everything else goes through `exec`.
#[async_trait]
pub trait RawConnection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin establishing the broker session with the given credentials
    async fn connect(&self, config: &ConnectionConfig) -> Result<(), Self::Error>;

    /// Issue SUBSCRIBE for `channel`; the ack arrives as a `SubscribeAck` event
    async fn subscribe(&self, channel: &str) -> Result<(), Self::Error>;

    /// Issue an arbitrary command array and await the broker reply
    async fn exec(&self, args: &[&str]) -> Result<Reply, Self::Error>;

    /// Close the underlying session
    async fn close(&self) -> Result<(), Self::Error>;
}

/// Factory opening raw connections wired to the session's event channel
pub trait Connector: Send + Sync + 'static {
    type Connection: RawConnection;

    /// Create the raw connection for `role`. All of the connection's events
    /// must be delivered through `events`, tagged with `role`.
    fn open(
        &self,
        role: ConnectionRole,
        events: mpsc::UnboundedSender<ConnectionUpdate>,
    ) -> Self::Connection;
}

impl<F: Connector> Connector for std::sync::Arc<F> {
    type Connection = F::Connection;

    fn open(
        &self,
        role: ConnectionRole,
        events: mpsc::UnboundedSender<ConnectionUpdate>,
    ) -> Self::Connection {
        (**self).open(role, events)
    }
}
