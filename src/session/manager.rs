//! Top-level session manager.
//!
//! One manager instance per process, owned and injected by the host. The
//! first `connect` call parses the URI and builds the connection pair plus
//! supervisor under a mutex, so concurrent first calls create exactly one
//! pair; every later call is an idempotent no-op.

use super::health::{HealthState, SessionHealth};
use super::pair::ConnectionPair;
use super::router::{InboundMessage, MessageRouter};
use super::subscriber::RetrySubscriber;
use super::supervisor::Supervisor;
use super::SharedSubscriptions;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::transport::{
    ConnectionRole, ConnectionState, Connector, RawConnection, Reply,
};
use crate::uri::ConnectionConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Acknowledgement returned by successful session operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
    Connected,
    AlreadyConnected,
    Subscribed,
    Unsubscribed,
    Published,
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ack::Connected => "connected",
            Ack::AlreadyConnected => "already_connected",
            Ack::Subscribed => "subscribed",
            Ack::Unsubscribed => "unsubscribed",
            Ack::Published => "published",
        };
        f.write_str(s)
    }
}

/// Live state behind a connected manager
struct SessionInner<C: RawConnection> {
    pair: ConnectionPair<C>,
    subscriptions: SharedSubscriptions,
    inbound_state: watch::Receiver<ConnectionState>,
    outbound_state: watch::Receiver<ConnectionState>,
    health: Arc<Mutex<HealthState>>,
    shutdown: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

/// Owns the connection pair and coordinates subscribes, publishes, and
/// reconnect supervision for one broker session.
pub struct SessionManager<F: Connector> {
    connector: F,
    config: SessionConfig,
    router: MessageRouter,
    inner: Mutex<Option<SessionInner<F::Connection>>>,
}

impl<F: Connector> SessionManager<F> {
    pub fn new(connector: F, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            router: MessageRouter::new(),
            inner: Mutex::new(None),
        }
    }

    /// Register a listener for inbound messages. Listeners may be added
    /// before or after `connect` and survive teardown.
    pub async fn add_listener(&self, listener: mpsc::Sender<InboundMessage>) {
        self.router.add_listener(listener).await;
    }

    /// Establish the session. The first call parses `uri`, opens the
    /// connection pair, and waits for both connections to become ready;
    /// subsequent calls return [`Ack::AlreadyConnected`] without touching
    /// the existing session.
    pub async fn connect(&self, uri: &str) -> Result<Ack, SessionError> {
        let mut slot = self.inner.lock().await;
        if slot.is_some() {
            debug!("session already established, ignoring connect");
            return Ok(Ack::AlreadyConnected);
        }

        let endpoint = ConnectionConfig::parse(uri)?;
        info!(host = %endpoint.host, port = endpoint.port, "establishing pub/sub session");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscriptions: SharedSubscriptions = Arc::new(Mutex::new(BTreeSet::new()));
        let health = Arc::new(Mutex::new(HealthState::default()));

        let pair = ConnectionPair::open(&self.connector, &endpoint, &events_tx).await?;

        let supervisor = Supervisor {
            pair: pair.clone(),
            endpoint: endpoint.clone(),
            resubscribe: self.config.reconnect.resubscribe,
            subscriptions: subscriptions.clone(),
            router: self.router.clone(),
            inbound_state: inbound_tx,
            outbound_state: outbound_tx,
            health: health.clone(),
        }
        .spawn(events_rx, shutdown_rx.clone());

        // Establishment failures surface to this caller; once the session
        // is up, recovery belongs to the supervisor alone.
        let timeout = self.config.connect_timeout();
        for (role, rx) in [
            (ConnectionRole::Inbound, inbound_rx.clone()),
            (ConnectionRole::Outbound, outbound_rx.clone()),
        ] {
            if let Err(e) = wait_until_connected(rx, role, timeout).await {
                let _ = shutdown_tx.send(true);
                pair.close().await;
                supervisor.abort();
                return Err(e);
            }
        }

        let keepalive = self.config.keepalive.enabled.then(|| {
            spawn_keepalive(
                pair.outbound().clone(),
                self.config.keepalive.interval(),
                shutdown_rx,
            )
        });

        *slot = Some(SessionInner {
            pair,
            subscriptions,
            inbound_state: inbound_rx,
            outbound_state: outbound_rx,
            health,
            shutdown: shutdown_tx,
            supervisor,
            keepalive,
        });

        info!("pub/sub session established");
        Ok(Ack::Connected)
    }

    /// Subscribe to `channel`, retrying while the inbound connection is not
    /// yet ready (bounded by the configured retry window).
    pub async fn subscribe(&self, channel: &str) -> Result<Ack, SessionError> {
        let subscriber = {
            let slot = self.inner.lock().await;
            let inner = slot.as_ref().ok_or(SessionError::Closed)?;
            RetrySubscriber::new(
                inner.pair.inbound().clone(),
                inner.inbound_state.clone(),
                inner.subscriptions.clone(),
                self.config.subscribe_retry.clone(),
            )
        };
        // The manager lock is released before the retry window starts, so a
        // slow subscribe never blocks other session operations.
        subscriber.subscribe(channel).await?;
        Ok(Ack::Subscribed)
    }

    /// Unsubscribe from `channel`. Issued on the inbound connection, which
    /// owns all subscription traffic.
    pub async fn unsubscribe(&self, channel: &str) -> Result<Ack, SessionError> {
        let (inbound, subscriptions) = {
            let slot = self.inner.lock().await;
            let inner = slot.as_ref().ok_or(SessionError::Closed)?;
            (inner.pair.inbound().clone(), inner.subscriptions.clone())
        };

        let reply = inbound
            .exec(&["UNSUBSCRIBE", channel])
            .await
            .map_err(|e| SessionError::exec(e.to_string()))?;
        check_reply(reply)?;

        subscriptions.lock().await.remove(channel);
        info!(channel, "unsubscribed from channel");
        Ok(Ack::Unsubscribed)
    }

    /// Publish `message` on `channel` via the outbound connection.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<Ack, SessionError> {
        let outbound = {
            let slot = self.inner.lock().await;
            let inner = slot.as_ref().ok_or(SessionError::Closed)?;
            inner.pair.outbound().clone()
        };

        let reply = outbound
            .exec(&["PUBLISH", channel, message])
            .await
            .map_err(|e| SessionError::exec(e.to_string()))?;
        check_reply(reply)?;

        debug!(channel, "published message");
        Ok(Ack::Published)
    }

    /// Tear the session down: stop the supervisor and keepalive, close both
    /// connections, and clear the subscription set. Idempotent; the manager
    /// accepts a fresh `connect` afterwards.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut slot = self.inner.lock().await;
        let Some(inner) = slot.take() else {
            return Ok(());
        };

        let _ = inner.shutdown.send(true);
        if let Some(keepalive) = inner.keepalive {
            keepalive.abort();
        }

        inner.pair.close().await;
        inner.subscriptions.lock().await.clear();

        let mut supervisor = inner.supervisor;
        match tokio::time::timeout(Duration::from_secs(2), &mut supervisor).await {
            Ok(Ok(())) => debug!("supervisor shut down cleanly"),
            Ok(Err(e)) if !e.is_cancelled() => warn!(error = %e, "supervisor task ended with error"),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!("supervisor did not stop in time, aborting");
                supervisor.abort();
            }
        }

        info!("pub/sub session closed");
        Ok(())
    }

    /// Current state of one half of the connection pair
    pub async fn state(&self, role: ConnectionRole) -> ConnectionState {
        let slot = self.inner.lock().await;
        match slot.as_ref() {
            Some(inner) => *match role {
                ConnectionRole::Inbound => inner.inbound_state.borrow(),
                ConnectionRole::Outbound => inner.outbound_state.borrow(),
            },
            None => ConnectionState::Disconnected,
        }
    }

    /// True when both connections are established
    pub async fn is_connected(&self) -> bool {
        self.state(ConnectionRole::Inbound).await.is_connected()
            && self.state(ConnectionRole::Outbound).await.is_connected()
    }

    /// Snapshot of the channels currently tracked as subscribed
    pub async fn subscriptions(&self) -> BTreeSet<String> {
        let slot = self.inner.lock().await;
        match slot.as_ref() {
            Some(inner) => inner.subscriptions.lock().await.clone(),
            None => BTreeSet::new(),
        }
    }

    /// Liveness metrics for the current session
    pub async fn health(&self) -> SessionHealth {
        let slot = self.inner.lock().await;
        match slot.as_ref() {
            Some(inner) => inner.health.lock().await.snapshot(),
            None => HealthState::default().snapshot(),
        }
    }
}

impl<F: Connector> Drop for SessionManager<F> {
    fn drop(&mut self) {
        // Drop cannot await a graceful join; callers wanting one use
        // disconnect(). This only keeps background tasks from leaking.
        if let Some(inner) = self.inner.get_mut() {
            let _ = inner.shutdown.send(true);
            if let Some(keepalive) = &inner.keepalive {
                keepalive.abort();
            }
            inner.supervisor.abort();
        }
    }
}

/// Map broker-level error replies to `Exec`. Transport already succeeded
/// here; this catches `-ERR ...` style replies the baseline used to swallow.
fn check_reply(reply: Reply) -> Result<(), SessionError> {
    match reply.error_detail() {
        Some(detail) => Err(SessionError::exec(detail.to_string())),
        None => Ok(()),
    }
}

/// Wait until `rx` reports Connected, failing fast on Disconnected
async fn wait_until_connected(
    mut rx: watch::Receiver<ConnectionState>,
    role: ConnectionRole,
    timeout: Duration,
) -> Result<(), SessionError> {
    let readiness = async {
        loop {
            let state = *rx.borrow();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    return Err(SessionError::connect_failed(format!(
                        "{} connection failed to establish",
                        role.as_str()
                    )));
                }
                ConnectionState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::connect_failed("state channel closed"));
            }
        }
    };

    match tokio::time::timeout(timeout, readiness).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::connect_failed(format!(
            "timed out waiting for {} connection readiness",
            role.as_str()
        ))),
    }
}

/// Periodic PING on the outbound connection. Pong events flow back through
/// the supervisor's event stream and feed health tracking.
fn spawn_keepalive<C: RawConnection>(
    outbound: Arc<C>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; skip the initial tick
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("shutdown signal received, stopping keepalive");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match outbound.exec(&["PING"]).await {
                        Ok(_) => debug!("keepalive ping sent"),
                        Err(e) => warn!(error = %e, "keepalive ping failed"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_display() {
        assert_eq!(Ack::Connected.to_string(), "connected");
        assert_eq!(Ack::AlreadyConnected.to_string(), "already_connected");
        assert_eq!(Ack::Subscribed.to_string(), "subscribed");
        assert_eq!(Ack::Unsubscribed.to_string(), "unsubscribed");
        assert_eq!(Ack::Published.to_string(), "published");
    }

    #[test]
    fn test_ack_serialization() {
        assert_eq!(
            serde_json::to_string(&Ack::AlreadyConnected).unwrap(),
            "\"already_connected\""
        );
    }

    #[test]
    fn test_check_reply() {
        assert!(check_reply(Reply::Simple("OK".to_string())).is_ok());
        assert!(check_reply(Reply::Integer(1)).is_ok());

        let err = check_reply(Reply::Error("ERR wrong number of arguments".to_string()));
        assert!(matches!(err, Err(SessionError::Exec { .. })));
    }

    #[tokio::test]
    async fn test_wait_until_connected_fails_fast_on_disconnect() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(ConnectionState::Disconnected);
        });

        let result =
            wait_until_connected(rx, ConnectionRole::Inbound, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SessionError::ConnectFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_connected_times_out() {
        // Keep the sender alive so the channel never closes
        let (tx, rx) = watch::channel(ConnectionState::Connecting);

        let result =
            wait_until_connected(rx, ConnectionRole::Outbound, Duration::from_millis(50)).await;

        assert!(matches!(result, Err(SessionError::ConnectFailed { .. })));
        drop(tx);
    }
}
