//! Readiness-gated subscribe with a bounded retry window.

use super::SharedSubscriptions;
use crate::config::SubscribeRetryConfig;
use crate::error::SessionError;
use crate::transport::{ConnectionState, RawConnection};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Issues a subscribe on the inbound connection once it is ready.
///
/// One instance exists per `subscribe` call, carrying that call's attempt
/// counter. Waits run on the tokio timer and are cancelled with the caller's
/// future, so the retry window never ties up a callback or UI thread.
pub struct RetrySubscriber<C> {
    inbound: Arc<C>,
    state: watch::Receiver<ConnectionState>,
    subscriptions: SharedSubscriptions,
    config: SubscribeRetryConfig,
}

impl<C: RawConnection> RetrySubscriber<C> {
    pub fn new(
        inbound: Arc<C>,
        state: watch::Receiver<ConnectionState>,
        subscriptions: SharedSubscriptions,
        config: SubscribeRetryConfig,
    ) -> Self {
        Self {
            inbound,
            state,
            subscriptions,
            config,
        }
    }

    /// Subscribe to `channel`, waiting for the inbound connection to become
    /// ready for up to `max_attempts` checks spaced `interval` apart.
    pub async fn subscribe(&self, channel: &str) -> Result<(), SessionError> {
        for attempt in 1..=self.config.max_attempts {
            let state = *self.state.borrow();
            if state.can_subscribe() {
                self.inbound
                    .subscribe(channel)
                    .await
                    .map_err(|e| SessionError::exec(e.to_string()))?;
                self.subscriptions.lock().await.insert(channel.to_string());
                debug!(channel, attempt, "subscribed to channel");
                return Ok(());
            }

            debug!(
                channel,
                attempt,
                ?state,
                "inbound connection not ready, waiting to subscribe"
            );
            tokio::time::sleep(self.config.interval()).await;
        }

        warn!(
            channel,
            attempts = self.config.max_attempts,
            "giving up on subscribe, inbound connection never became ready"
        );
        Err(SessionError::ClientNotConnected {
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockBehavior, MockConnector};
    use crate::transport::{ConnectionRole, Connector};
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tokio::sync::{mpsc, Mutex};

    fn subscriber_with_state(
        state: ConnectionState,
    ) -> (
        RetrySubscriber<crate::testing::mocks::MockConnection>,
        crate::testing::mocks::MockConnection,
        watch::Sender<ConnectionState>,
    ) {
        let connector = MockConnector::with_behavior(MockBehavior::manual());
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let conn = connector.open(ConnectionRole::Inbound, events_tx);
        let (state_tx, state_rx) = watch::channel(state);
        let subscriber = RetrySubscriber::new(
            Arc::new(conn.clone()),
            state_rx,
            Arc::new(Mutex::new(BTreeSet::new())),
            SubscribeRetryConfig::default(),
        );
        (subscriber, conn, state_tx)
    }

    #[tokio::test]
    async fn test_subscribe_succeeds_first_attempt_when_connected() {
        let (subscriber, conn, _state_tx) = subscriber_with_state(ConnectionState::Connected);

        subscriber.subscribe("orders").await.unwrap();

        assert_eq!(conn.subscribe_calls().await, vec!["orders".to_string()]);
        assert!(subscriber.subscriptions.lock().await.contains("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_exhausts_retry_window() {
        let (subscriber, conn, _state_tx) = subscriber_with_state(ConnectionState::Connecting);

        let started = tokio::time::Instant::now();
        let result = subscriber.subscribe("orders").await;

        // 5 attempts spaced 1s apart: ~5s of (paused) time, then failure
        assert!(matches!(
            result,
            Err(SessionError::ClientNotConnected { attempts: 5 })
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(conn.subscribe_calls().await.is_empty());
        assert!(subscriber.subscriptions.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_succeeds_once_connection_becomes_ready() {
        let (subscriber, conn, state_tx) = subscriber_with_state(ConnectionState::Connecting);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let _ = state_tx.send(ConnectionState::Connected);
        });

        subscriber.subscribe("orders").await.unwrap();

        assert_eq!(conn.subscribe_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_surfaces_transport_failure() {
        let (subscriber, conn, _state_tx) = subscriber_with_state(ConnectionState::Connected);
        conn.fail_next_subscribe().await;

        let result = subscriber.subscribe("orders").await;

        assert!(matches!(result, Err(SessionError::Exec { .. })));
        assert!(subscriber.subscriptions.lock().await.is_empty());
    }
}
