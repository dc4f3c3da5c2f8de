//! Error types for pub/sub session operations.
//!
//! Maps internal failures to the small set of host-facing error codes so a
//! bridge layer can surface `{code, message}` pairs without knowing anything
//! about the session internals.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed connection URI: {detail}")]
    MalformedUri { detail: String },

    #[error("connection could not be established: {reason}")]
    ConnectFailed { reason: String },

    #[error("client not connected after {attempts} subscribe attempts")]
    ClientNotConnected { attempts: u32 },

    #[error("command execution failed: {detail}")]
    Exec { detail: String },

    #[error("session is not connected")]
    Closed,
}

impl SessionError {
    /// Create a URI parse error
    pub fn malformed_uri<S: Into<String>>(detail: S) -> Self {
        Self::MalformedUri {
            detail: detail.into(),
        }
    }

    /// Create a connection establishment error
    pub fn connect_failed<S: Into<String>>(reason: S) -> Self {
        Self::ConnectFailed {
            reason: reason.into(),
        }
    }

    /// Create a command execution error
    pub fn exec<S: Into<String>>(detail: S) -> Self {
        Self::Exec {
            detail: detail.into(),
        }
    }

    /// Host-facing error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::MalformedUri { .. } => ErrorCode::MalformedUri,
            SessionError::ConnectFailed { .. } => ErrorCode::ConnectError,
            SessionError::ClientNotConnected { .. } => ErrorCode::ClientNotConnected,
            SessionError::Exec { .. } => ErrorCode::ExecError,
            SessionError::Closed => ErrorCode::Closed,
        }
    }

    /// Convert to the `{code, message}` pair handed across the host bridge.
    /// The message is sanitized before it leaves the crate.
    pub fn to_host_error(&self) -> HostError {
        HostError {
            code: self.code(),
            message: sanitize_error_message(&self.to_string()),
        }
    }
}

/// Error codes exposed to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedUri,
    ConnectError,
    ClientNotConnected,
    ExecError,
    Closed,
}

/// Serializable `{code, message}` error shape for host bridges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostError {
    pub code: ErrorCode,
    pub message: String,
}

static SECRET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex"));

static URI_USERINFO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"redis://[^@/\s]+@").expect("static regex"));

/// Sanitize error messages so credentials never leak into logs or bridges
fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN.replace_all(message, "${1}=***").to_string();

    // Connection URIs carry the password in the userinfo segment
    sanitized = URI_USERINFO_PATTERN
        .replace_all(&sanitized, "redis://***@")
        .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let max_content_len = 500 - truncate_suffix.len();
        sanitized = format!("{}{}", &sanitized[..max_content_len], truncate_suffix);
    }

    sanitized
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SessionError::malformed_uri("bad").code(),
            ErrorCode::MalformedUri
        );
        assert_eq!(
            SessionError::connect_failed("down").code(),
            ErrorCode::ConnectError
        );
        assert_eq!(
            SessionError::ClientNotConnected { attempts: 5 }.code(),
            ErrorCode::ClientNotConnected
        );
        assert_eq!(SessionError::exec("refused").code(), ErrorCode::ExecError);
        assert_eq!(SessionError::Closed.code(), ErrorCode::Closed);
    }

    #[test]
    fn test_host_error_serialization() {
        let host_error = SessionError::ClientNotConnected { attempts: 5 }.to_host_error();
        let json = serde_json::to_string(&host_error).unwrap();

        assert!(json.contains("client_not_connected"));
        assert!(json.contains("5 subscribe attempts"));
    }

    #[test]
    fn test_error_display() {
        let error = SessionError::ClientNotConnected { attempts: 5 };
        assert_eq!(
            error.to_string(),
            "client not connected after 5 subscribe attempts"
        );
    }

    #[test]
    fn test_sanitize_password_assignment() {
        let error = SessionError::connect_failed("auth rejected: password=hunter2");
        let host_error = error.to_host_error();

        assert!(!host_error.message.contains("hunter2"));
        assert!(host_error.message.contains("password=***"));
    }

    #[test]
    fn test_sanitize_uri_userinfo() {
        let error = SessionError::malformed_uri("could not resolve redis://s3cr3t@broker:6379");
        let host_error = error.to_host_error();

        assert!(!host_error.message.contains("s3cr3t"));
        assert!(host_error.message.contains("redis://***@"));
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let sanitized = sanitize_error_message(&"x".repeat(600));

        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_leaves_short_messages_untouched() {
        assert_eq!(sanitize_error_message("plain failure"), "plain failure");
        assert_eq!(sanitize_error_message(""), "");
    }
}
