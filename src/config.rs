//! Session configuration.
//!
//! All fields have serde defaults so an empty TOML document yields the stock
//! behavior: 5 subscribe attempts 1s apart, no automatic re-subscription
//! after a reconnect, keepalive pings every 60s.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default)]
    pub subscribe_retry: SubscribeRetryConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    /// How long `connect` waits for both connections to become ready
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subscribe_retry: SubscribeRetryConfig::default(),
            reconnect: ReconnectConfig::default(),
            keepalive: KeepaliveConfig::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Retry window for subscribes issued against a not-yet-ready connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribeRetryConfig {
    /// Total attempts before giving up
    #[serde(default = "default_subscribe_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    #[serde(default = "default_subscribe_interval_ms")]
    pub interval_ms: u64,
}

impl SubscribeRetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SubscribeRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_subscribe_attempts(),
            interval_ms: default_subscribe_interval_ms(),
        }
    }
}

/// Reconnect supervision policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReconnectConfig {
    /// Re-issue tracked subscriptions when the inbound connection comes back.
    /// Off by default: callers re-subscribe explicitly if they need
    /// durability across reconnects.
    #[serde(default)]
    pub resubscribe: bool,
}

/// Keepalive pings on the outbound connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeepaliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_keepalive_interval_secs")]
    pub interval_secs: u64,
}

impl KeepaliveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_keepalive_interval_secs(),
        }
    }
}

fn default_subscribe_attempts() -> u32 {
    5
}

fn default_subscribe_interval_ms() -> u64 {
    1000
}

fn default_keepalive_interval_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscribe_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "subscribe_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.subscribe_retry.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "subscribe_retry.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.keepalive.enabled && self.keepalive.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "keepalive.interval_secs must be greater than 0 when enabled".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
