//! Session layer: the connection pair, subscribe retry gate, reconnect
//! supervisor, message router, and the top-level manager.

pub mod health;
pub mod manager;
pub mod pair;
pub mod router;
pub mod subscriber;
pub(crate) mod supervisor;

pub use health::SessionHealth;
pub use manager::{Ack, SessionManager};
pub use pair::ConnectionPair;
pub use router::{InboundMessage, MessageRouter};
pub use subscriber::RetrySubscriber;

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Channels currently subscribed on the inbound connection.
/// Shared between subscribe/unsubscribe callers and the supervisor.
pub type SharedSubscriptions = Arc<Mutex<BTreeSet<String>>>;
