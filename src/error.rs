//! Error taxonomy for the client facade.
//!
//! Every failure is surfaced to the caller; nothing here is treated as fatal
//! to the process. The caller decides whether to retry, fail fast, or degrade.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for client facade operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid or incomplete configuration, raised at construction time.
    #[error("configuration error")]
    Configuration(#[from] ConfigError),

    /// Connect or disconnect failed, or disconnect was called while not
    /// connected.
    #[error("connection error: {0}")]
    Connection(String),

    /// Connection setup or teardown failed with a transport-level error.
    #[error("connection error")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A subscribe, unsubscribe or publish request was rejected locally.
    #[error("operation failed: {0}")]
    Operation(String),

    /// A subscribe, unsubscribe or publish request failed in the transport.
    #[error("operation failed")]
    OperationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Snapshot requested before the first successful connect; there is no
    /// transport client to introspect yet.
    #[error("not connected: no transport client to introspect")]
    NotConnected,
}

impl ClientError {
    /// True for connect/disconnect lifecycle failures.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ConnectionFailed(_))
    }

    /// True for subscribe/unsubscribe/publish failures.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_) | Self::OperationFailed(_))
    }
}

/// Result type for client facade operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_non_empty() {
        let errors = vec![
            ClientError::Connection("handshake refused".to_string()),
            ClientError::ConnectionFailed("io".to_string().into()),
            ClientError::Operation("not connected".to_string()),
            ClientError::OperationFailed("broker rejected".to_string().into()),
            ClientError::NotConnected,
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_error_category_predicates() {
        assert!(ClientError::Connection("x".to_string()).is_connection());
        assert!(!ClientError::Connection("x".to_string()).is_operation());
        assert!(ClientError::Operation("x".to_string()).is_operation());
        assert!(!ClientError::NotConnected.is_connection());
        assert!(!ClientError::NotConnected.is_operation());
    }
}
