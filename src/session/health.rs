//! Session health metrics.

use std::time::{Duration, Instant};

/// Snapshot of session liveness, derived from supervisor bookkeeping
#[derive(Debug, Clone)]
pub struct SessionHealth {
    /// Time since the inbound connection last became ready
    pub uptime: Option<Duration>,
    /// Time since the last inbound message
    pub time_since_last_message: Option<Duration>,
    /// Time since the last keepalive pong
    pub time_since_last_pong: Option<Duration>,
    /// Reconnect attempts issued over the session lifetime
    pub reconnect_count: u32,
    pub is_healthy: bool,
}

/// Mutable health bookkeeping, written by the supervisor
#[derive(Debug, Default)]
pub(crate) struct HealthState {
    pub connected_at: Option<Instant>,
    pub last_message: Option<Instant>,
    pub last_pong: Option<Instant>,
    pub reconnect_count: u32,
}

const STALE_AFTER: Duration = Duration::from_secs(300);

impl HealthState {
    pub fn snapshot(&self) -> SessionHealth {
        let now = Instant::now();
        let uptime = self.connected_at.map(|t| now.duration_since(t));
        let time_since_last_message = self.last_message.map(|t| now.duration_since(t));
        let time_since_last_pong = self.last_pong.map(|t| now.duration_since(t));

        SessionHealth {
            uptime,
            time_since_last_message,
            time_since_last_pong,
            reconnect_count: self.reconnect_count,
            is_healthy: determine_health_status(uptime, time_since_last_pong),
        }
    }
}

/// Healthy means: connected, and the broker answered a keepalive recently
/// (or none has been sent yet)
fn determine_health_status(uptime: Option<Duration>, since_pong: Option<Duration>) -> bool {
    match (uptime, since_pong) {
        (Some(_), None) => true,
        (Some(_), Some(pong)) => pong < STALE_AFTER,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_connected_is_unhealthy() {
        let health = HealthState::default().snapshot();

        assert!(health.uptime.is_none());
        assert_eq!(health.reconnect_count, 0);
        assert!(!health.is_healthy);
    }

    #[test]
    fn test_connected_without_pong_is_healthy() {
        let state = HealthState {
            connected_at: Some(Instant::now()),
            ..Default::default()
        };
        assert!(state.snapshot().is_healthy);
    }

    #[test]
    fn test_recent_pong_is_healthy() {
        let now = Instant::now();
        let state = HealthState {
            connected_at: Some(now - Duration::from_secs(3600)),
            last_pong: Some(now - Duration::from_secs(30)),
            last_message: Some(now - Duration::from_secs(10)),
            reconnect_count: 2,
        };

        let health = state.snapshot();
        assert!(health.is_healthy);
        assert_eq!(health.reconnect_count, 2);
        assert!(health.uptime.unwrap() >= Duration::from_secs(3600));
    }

    #[test]
    fn test_stale_pong_is_unhealthy() {
        assert!(!determine_health_status(
            Some(Duration::from_secs(3600)),
            Some(Duration::from_secs(400)),
        ));
    }
}
