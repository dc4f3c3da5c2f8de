//! The fixed pair of raw connections backing a session.

use crate::error::SessionError;
use crate::transport::{ConnectionRole, ConnectionUpdate, Connector, RawConnection};
use crate::uri::ConnectionConfig;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Exactly two raw connections: one for subscriptions, one for commands.
/// Created once per session; the same handles are reconnected in place by
/// the supervisor after a drop.
pub struct ConnectionPair<C> {
    inbound: Arc<C>,
    outbound: Arc<C>,
}

impl<C: RawConnection> ConnectionPair<C> {
    /// Open both connections through `connector` and initiate establishment
    /// with the parsed credentials. Readiness is reported on `events`, not
    /// by this call.
    pub async fn open<F>(
        connector: &F,
        config: &ConnectionConfig,
        events: &mpsc::UnboundedSender<ConnectionUpdate>,
    ) -> Result<Self, SessionError>
    where
        F: Connector<Connection = C>,
    {
        let inbound = Arc::new(connector.open(ConnectionRole::Inbound, events.clone()));
        let outbound = Arc::new(connector.open(ConnectionRole::Outbound, events.clone()));

        inbound
            .connect(config)
            .await
            .map_err(|e| SessionError::connect_failed(e.to_string()))?;
        outbound
            .connect(config)
            .await
            .map_err(|e| SessionError::connect_failed(e.to_string()))?;

        Ok(Self { inbound, outbound })
    }

    pub fn inbound(&self) -> &Arc<C> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<C> {
        &self.outbound
    }

    pub fn get(&self, role: ConnectionRole) -> &Arc<C> {
        match role {
            ConnectionRole::Inbound => &self.inbound,
            ConnectionRole::Outbound => &self.outbound,
        }
    }

    /// Close both sessions. Close failures are logged, not surfaced: the
    /// pair is being torn down either way.
    pub async fn close(&self) {
        for role in [ConnectionRole::Inbound, ConnectionRole::Outbound] {
            if let Err(e) = self.get(role).close().await {
                warn!(connection = role.as_str(), error = %e, "error closing connection");
            }
        }
    }
}

impl<C> Clone for ConnectionPair<C> {
    fn clone(&self) -> Self {
        Self {
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
        }
    }
}
