//! Mock raw connections for testing.
//!
//! Provides a scriptable [`MockConnection`] and matching [`MockConnector`]
//! so session behavior can be exercised without a broker: tests inspect the
//! recorded calls and push events into the session exactly as a real wire
//! implementation would.

use crate::transport::{
    ConnectionEvent, ConnectionRole, ConnectionUpdate, Connector, RawConnection, Reply,
};
use crate::uri::ConnectionConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Error type raised by mock connections
#[derive(Debug, Error)]
#[error("mock transport error: {0}")]
pub struct MockError(pub String);

/// How a mock connection responds to calls
#[derive(Debug, Clone, Copy)]
pub struct MockBehavior {
    /// Emit `Connected` immediately from `connect`
    pub auto_connect: bool,
    /// Emit `SubscribeAck` immediately from `subscribe`
    pub auto_ack_subscribe: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            auto_connect: true,
            auto_ack_subscribe: true,
        }
    }
}

impl MockBehavior {
    /// No automatic events: the test drives every event explicitly
    pub fn manual() -> Self {
        Self {
            auto_connect: false,
            auto_ack_subscribe: false,
        }
    }
}

/// Mock raw connection recording every call and emitting scripted events
#[derive(Clone)]
pub struct MockConnection {
    role: ConnectionRole,
    behavior: MockBehavior,
    events: mpsc::UnboundedSender<ConnectionUpdate>,
    connect_calls: Arc<Mutex<Vec<ConnectionConfig>>>,
    subscribe_calls: Arc<Mutex<Vec<String>>>,
    exec_calls: Arc<Mutex<Vec<Vec<String>>>>,
    close_count: Arc<Mutex<u32>>,
    connect_fail: Arc<Mutex<bool>>,
    subscribe_fail: Arc<Mutex<bool>>,
    exec_replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl MockConnection {
    fn new(
        role: ConnectionRole,
        behavior: MockBehavior,
        events: mpsc::UnboundedSender<ConnectionUpdate>,
    ) -> Self {
        Self {
            role,
            behavior,
            events,
            connect_calls: Arc::new(Mutex::new(Vec::new())),
            subscribe_calls: Arc::new(Mutex::new(Vec::new())),
            exec_calls: Arc::new(Mutex::new(Vec::new())),
            close_count: Arc::new(Mutex::new(0)),
            connect_fail: Arc::new(Mutex::new(false)),
            subscribe_fail: Arc::new(Mutex::new(false)),
            exec_replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Push an event into the session as if it came from the wire
    pub fn emit(&self, event: ConnectionEvent) {
        // A closed receiver just means the session is gone; nothing to do
        let _ = self.events.send(ConnectionUpdate::new(self.role, event));
    }

    /// Queue a scripted reply for the next `exec` call
    pub async fn push_exec_reply(&self, reply: Reply) {
        self.exec_replies.lock().await.push_back(reply);
    }

    pub async fn fail_next_connect(&self) {
        *self.connect_fail.lock().await = true;
    }

    pub async fn fail_next_subscribe(&self) {
        *self.subscribe_fail.lock().await = true;
    }

    pub async fn connect_calls(&self) -> Vec<ConnectionConfig> {
        self.connect_calls.lock().await.clone()
    }

    pub async fn subscribe_calls(&self) -> Vec<String> {
        self.subscribe_calls.lock().await.clone()
    }

    pub async fn exec_calls(&self) -> Vec<Vec<String>> {
        self.exec_calls.lock().await.clone()
    }

    pub async fn close_count(&self) -> u32 {
        *self.close_count.lock().await
    }

    /// Built-in reply shapes for the commands the session issues
    fn default_reply(args: &[&str]) -> Reply {
        match args.first().copied() {
            Some("PING") => Reply::Simple("PONG".to_string()),
            Some("PUBLISH") => Reply::Integer(1),
            Some("UNSUBSCRIBE") => Reply::Array(vec![
                Reply::Bulk("unsubscribe".to_string()),
                Reply::Bulk(args.get(1).copied().unwrap_or_default().to_string()),
                Reply::Integer(0),
            ]),
            _ => Reply::Simple("OK".to_string()),
        }
    }
}

#[async_trait]
impl RawConnection for MockConnection {
    type Error = MockError;

    async fn connect(&self, config: &ConnectionConfig) -> Result<(), Self::Error> {
        self.connect_calls.lock().await.push(config.clone());

        if std::mem::take(&mut *self.connect_fail.lock().await) {
            return Err(MockError("connect refused".to_string()));
        }

        if self.behavior.auto_connect {
            self.emit(ConnectionEvent::Connected);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), Self::Error> {
        self.subscribe_calls.lock().await.push(channel.to_string());

        if std::mem::take(&mut *self.subscribe_fail.lock().await) {
            return Err(MockError("subscribe refused".to_string()));
        }

        if self.behavior.auto_ack_subscribe {
            self.emit(ConnectionEvent::SubscribeAck {
                channel: channel.to_string(),
            });
        }
        Ok(())
    }

    async fn exec(&self, args: &[&str]) -> Result<Reply, Self::Error> {
        self.exec_calls
            .lock()
            .await
            .push(args.iter().map(|a| a.to_string()).collect());

        let scripted = self.exec_replies.lock().await.pop_front();
        match scripted {
            Some(reply) => Ok(reply),
            None => {
                if args.first().copied() == Some("PING") {
                    self.emit(ConnectionEvent::Pong);
                }
                Ok(Self::default_reply(args))
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        *self.close_count.lock().await += 1;
        Ok(())
    }
}

/// Connector handing out mock connections and keeping hold of every one it
/// created so tests can drive and inspect them afterwards
pub struct MockConnector {
    behavior: MockBehavior,
    created: StdMutex<Vec<MockConnection>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::default())
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            created: StdMutex::new(Vec::new()),
        }
    }

    /// The most recently created connection for `role`
    pub fn connection(&self, role: ConnectionRole) -> MockConnection {
        self.created
            .lock()
            .expect("mock connector lock")
            .iter()
            .rev()
            .find(|c| c.role == role)
            .cloned()
            .expect("no connection created for role")
    }

    /// How many connections have been created for `role`
    pub fn open_count(&self, role: ConnectionRole) -> usize {
        self.created
            .lock()
            .expect("mock connector lock")
            .iter()
            .filter(|c| c.role == role)
            .count()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn open(
        &self,
        role: ConnectionRole,
        events: mpsc::UnboundedSender<ConnectionUpdate>,
    ) -> Self::Connection {
        let connection = MockConnection::new(role, self.behavior, events);
        self.created
            .lock()
            .expect("mock connector lock")
            .push(connection.clone());
        connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ConnectionConfig {
        ConnectionConfig::parse("redis://secret@localhost:6379").unwrap()
    }

    #[tokio::test]
    async fn test_auto_connect_emits_connected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connector = MockConnector::new();
        let conn = connector.open(ConnectionRole::Inbound, tx);

        conn.connect(&endpoint()).await.unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.role, ConnectionRole::Inbound);
        assert_eq!(update.event, ConnectionEvent::Connected);
        assert_eq!(conn.connect_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_behavior_emits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connector = MockConnector::with_behavior(MockBehavior::manual());
        let conn = connector.open(ConnectionRole::Outbound, tx);

        conn.connect(&endpoint()).await.unwrap();
        conn.subscribe("orders").await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scripted_exec_reply() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connector = MockConnector::new();
        let conn = connector.open(ConnectionRole::Outbound, tx);
        conn.push_exec_reply(Reply::Error("ERR nope".to_string()))
            .await;

        let reply = conn.exec(&["PUBLISH", "orders", "x"]).await.unwrap();
        assert!(reply.is_error());

        // Scripted queue drained; built-in reply shape takes over
        let reply = conn.exec(&["PUBLISH", "orders", "x"]).await.unwrap();
        assert_eq!(reply, Reply::Integer(1));
    }

    #[tokio::test]
    async fn test_ping_emits_pong() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connector = MockConnector::new();
        let conn = connector.open(ConnectionRole::Outbound, tx);

        let reply = conn.exec(&["PING"]).await.unwrap();

        assert_eq!(reply, Reply::Simple("PONG".to_string()));
        assert_eq!(rx.recv().await.unwrap().event, ConnectionEvent::Pong);
    }

    #[tokio::test]
    async fn test_fail_next_connect_is_one_shot() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connector = MockConnector::new();
        let conn = connector.open(ConnectionRole::Inbound, tx);
        conn.fail_next_connect().await;

        assert!(conn.connect(&endpoint()).await.is_err());
        assert!(conn.connect(&endpoint()).await.is_ok());
    }

    #[test]
    fn test_connector_tracks_created_connections() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connector = MockConnector::new();
        let _a = connector.open(ConnectionRole::Inbound, tx.clone());
        let _b = connector.open(ConnectionRole::Outbound, tx);

        assert_eq!(connector.open_count(ConnectionRole::Inbound), 1);
        assert_eq!(connector.open_count(ConnectionRole::Outbound), 1);
        assert_eq!(
            connector.connection(ConnectionRole::Inbound).role(),
            ConnectionRole::Inbound
        );
    }
}
