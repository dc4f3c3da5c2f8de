//! Connection URI parsing.
//!
//! Accepts `redis://[password@]host:port`. The userinfo segment carries the
//! password (a bare token, not `user:pass`), matching how the broker expects
//! AUTH-only credentials. Database selection via a trailing path segment is
//! not supported.

use crate::error::SessionError;
use std::fmt;
use url::Url;

/// Parsed broker endpoint. Immutable for the lifetime of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl ConnectionConfig {
    /// Parse a connection URI into host, port, and password.
    ///
    /// Every malformed input maps to [`SessionError::MalformedUri`].
    pub fn parse(uri: &str) -> Result<Self, SessionError> {
        let url = Url::parse(uri).map_err(|e| SessionError::malformed_uri(e.to_string()))?;

        if url.scheme() != "redis" {
            return Err(SessionError::malformed_uri(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SessionError::malformed_uri("missing host"))?;

        let port = url
            .port()
            .ok_or_else(|| SessionError::malformed_uri("missing port"))?;

        if !matches!(url.path(), "" | "/") {
            return Err(SessionError::malformed_uri(
                "database selection is not supported",
            ));
        }

        Ok(ConnectionConfig {
            host: host.to_string(),
            port,
            password: url.username().to_string(),
        })
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

// Manual Debug so the password never reaches log output
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", if self.has_password() { &"***" } else { &"" })
            .finish()
    }
}
