//! Background supervision of the connection pair.
//!
//! A single spawned task consumes the merged event stream of both raw
//! connections. It is the only writer of the per-connection state channels
//! and the only place reconnects are issued from: on a disconnect of either
//! connection it immediately re-issues `connect` with the stored
//! credentials - no backoff, no attempt limit, for the life of the session.
//! Reconnect failures are logged and dropped; the next disconnect event
//! triggers the next attempt.

use super::health::HealthState;
use super::pair::ConnectionPair;
use super::router::{InboundMessage, MessageRouter};
use super::SharedSubscriptions;
use crate::transport::{
    state, ConnectionEvent, ConnectionRole, ConnectionState, ConnectionUpdate, RawConnection,
};
use crate::uri::ConnectionConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub(crate) struct Supervisor<C: RawConnection> {
    pub pair: ConnectionPair<C>,
    pub endpoint: ConnectionConfig,
    pub resubscribe: bool,
    pub subscriptions: SharedSubscriptions,
    pub router: MessageRouter,
    pub inbound_state: watch::Sender<ConnectionState>,
    pub outbound_state: watch::Sender<ConnectionState>,
    pub health: Arc<Mutex<HealthState>>,
}

impl<C: RawConnection> Supervisor<C> {
    /// Run the supervision loop until shutdown is signalled or the event
    /// channel closes.
    pub fn spawn(
        self,
        mut events: mpsc::UnboundedReceiver<ConnectionUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(host = %self.endpoint.host, port = self.endpoint.port, "session supervisor started");
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("shutdown signal received, stopping session supervisor");
                            break;
                        }
                    }
                    update = events.recv() => {
                        match update {
                            Some(update) => self.handle(update).await,
                            None => {
                                debug!("connection event channel closed, stopping supervisor");
                                break;
                            }
                        }
                    }
                }
            }
            info!("session supervisor stopped");
        })
    }

    async fn handle(&self, update: ConnectionUpdate) {
        let role = update.role;
        if let Some(next) = state::next_state(&update.event) {
            self.state_sender(role).send_replace(next);
        }

        match update.event {
            ConnectionEvent::Connected => {
                info!(connection = role.as_str(), "connection established");
                if role == ConnectionRole::Inbound {
                    self.health.lock().await.connected_at = Some(Instant::now());
                    if self.resubscribe {
                        self.resubscribe_all().await;
                    }
                }
            }
            ConnectionEvent::Disconnected { reason } => {
                warn!(connection = role.as_str(), %reason, "connection lost, reconnecting");
                self.reconnect(role).await;
            }
            ConnectionEvent::SubscribeAck { channel } => {
                debug!(connection = role.as_str(), channel, "subscription acknowledged");
            }
            ConnectionEvent::Message { channel, payload } => {
                if role == ConnectionRole::Inbound {
                    self.health.lock().await.last_message = Some(Instant::now());
                    self.router.deliver(InboundMessage { channel, payload }).await;
                } else {
                    warn!(channel, "ignoring message event on the outbound connection");
                }
            }
            ConnectionEvent::Pong => {
                debug!(connection = role.as_str(), "keepalive pong received");
                self.health.lock().await.last_pong = Some(Instant::now());
            }
        }
    }

    /// Re-establish the dropped connection with the stored credentials.
    /// Fire-and-forget: a failure here is logged and the next disconnect
    /// event drives the next attempt.
    async fn reconnect(&self, role: ConnectionRole) {
        self.health.lock().await.reconnect_count += 1;
        self.state_sender(role)
            .send_replace(ConnectionState::Connecting);

        if let Err(e) = self.pair.get(role).connect(&self.endpoint).await {
            error!(connection = role.as_str(), error = %e, "reconnect attempt failed");
            self.state_sender(role)
                .send_replace(ConnectionState::Disconnected);
        }
    }

    /// Re-issue every tracked subscription on the freshly connected inbound
    /// session. Only runs when the resubscribe policy is enabled.
    async fn resubscribe_all(&self) {
        let channels: Vec<String> = self.subscriptions.lock().await.iter().cloned().collect();
        for channel in channels {
            match self.pair.inbound().subscribe(&channel).await {
                Ok(()) => debug!(channel, "re-subscribed after reconnect"),
                Err(e) => error!(channel, error = %e, "re-subscribe after reconnect failed"),
            }
        }
    }

    fn state_sender(&self, role: ConnectionRole) -> &watch::Sender<ConnectionState> {
        match role {
            ConnectionRole::Inbound => &self.inbound_state,
            ConnectionRole::Outbound => &self.outbound_state,
        }
    }
}
