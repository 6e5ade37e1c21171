//! Error types for net-multicom

use thiserror::Error;

/// Main error type for net-multicom
#[derive(Debug, Error)]
pub enum MulticomError {
    /// A requested command matched the deny-list; aborts the whole run
    #[error("Rejected command '{command}': matches denied token '{matched_token}'")]
    RejectedCommand {
        command: String,
        matched_token: String,
    },

    /// SSH connection to a device failed (handshake, refusal, transport)
    #[error("SSH connection error to {host}: {cause}")]
    Connection { host: String, cause: String },

    /// The device refused the credentials
    #[error("Authentication failed on {host}: {cause}")]
    Authentication { host: String, cause: String },

    /// A network operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Privilege elevation (enable mode) failed
    #[error("Elevation failed: {0}")]
    Elevation(String),

    /// A single command could not be executed
    #[error("Command failed: {0}")]
    Command(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inventory could not be loaded or is invalid
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using MulticomError
pub type Result<T> = std::result::Result<T, MulticomError>;

impl MulticomError {
    /// Create a connection error for a host
    pub fn connection(host: impl Into<String>, cause: impl Into<String>) -> Self {
        MulticomError::Connection {
            host: host.into(),
            cause: cause.into(),
        }
    }

    /// Create an authentication error for a host
    pub fn auth(host: impl Into<String>, cause: impl Into<String>) -> Self {
        MulticomError::Authentication {
            host: host.into(),
            cause: cause.into(),
        }
    }

    /// Create an elevation error from a string
    pub fn elevation(msg: impl Into<String>) -> Self {
        MulticomError::Elevation(msg.into())
    }

    /// Create a command error from a string
    pub fn command(msg: impl Into<String>) -> Self {
        MulticomError::Command(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        MulticomError::Config(msg.into())
    }

    /// Create an inventory error from a string
    pub fn inventory(msg: impl Into<String>) -> Self {
        MulticomError::Inventory(msg.into())
    }

    /// Timeout error from a `Duration`
    pub fn timeout(duration: std::time::Duration) -> Self {
        MulticomError::Timeout(duration.as_millis() as u64)
    }

    /// Whether this error means the session itself can no longer be trusted
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            MulticomError::Timeout(_) | MulticomError::Connection { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = MulticomError::connection("r1", "connection refused");
        assert_eq!(
            err.to_string(),
            "SSH connection error to r1: connection refused"
        );

        let err = MulticomError::Timeout(5000);
        assert_eq!(err.to_string(), "Timeout after 5000ms");

        let err = MulticomError::RejectedCommand {
            command: "conf t".to_string(),
            matched_token: "conf".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Rejected command 'conf t': matches denied token 'conf'"
        );

        let err = MulticomError::auth("r1", "Authentication rejected for user 'admin'");
        assert_eq!(
            err.to_string(),
            "Authentication failed on r1: Authentication rejected for user 'admin'"
        );
    }

    #[test]
    fn test_timeout_from_duration() {
        let err = MulticomError::timeout(Duration::from_secs(3));
        assert!(matches!(err, MulticomError::Timeout(3000)));
        assert!(err.is_session_fatal());
        assert!(!MulticomError::command("bad input").is_session_fatal());
    }
}
