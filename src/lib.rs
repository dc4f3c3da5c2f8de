//! Redis pub/sub session management.
//!
//! This crate keeps a host application's publish/subscribe session alive
//! against a Redis-style broker. It owns a fixed pair of raw connections -
//! one dedicated to inbound subscription traffic, one to outbound commands -
//! and layers the pieces with real state on top of them:
//!
//! - URI parsing into connection credentials
//! - a retry window for subscribes issued before the connection is ready
//! - a reconnect supervisor that re-establishes dropped connections
//! - a router delivering inbound messages to registered listeners
//!
//! The wire protocol itself is not implemented here. Hosts plug their
//! transport in through the [`transport::RawConnection`] /
//! [`transport::Connector`] seam; [`testing::MockConnector`] implements the
//! same seam for tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use redis_pubsub_session::testing::MockConnector;
//! use redis_pubsub_session::{SessionConfig, SessionError, SessionManager};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), SessionError> {
//! let manager = SessionManager::new(MockConnector::new(), SessionConfig::default());
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! manager.add_listener(tx).await;
//!
//! manager.connect("redis://secret@localhost:6379").await?;
//! manager.subscribe("orders").await?;
//! manager.publish("orders", "{\"id\":42}").await?;
//!
//! if let Some(message) = rx.recv().await {
//!     println!("{} -> {}", message.channel, message.payload);
//! }
//!
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod session;
pub mod testing;
pub mod transport;
pub mod uri;

pub use config::{
    ConfigError, KeepaliveConfig, ReconnectConfig, SessionConfig, SubscribeRetryConfig,
};
pub use error::{ErrorCode, HostError, SessionError, SessionResult};
pub use session::{Ack, InboundMessage, MessageRouter, SessionHealth, SessionManager};
pub use transport::{
    ConnectionEvent, ConnectionRole, ConnectionState, Connector, RawConnection, Reply,
};
pub use uri::ConnectionConfig;
