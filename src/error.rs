//! Error types for the object synchronization client.

use thiserror::Error;

/// Raw transport faults.
///
/// These never leave the transport pipeline: `Client::post` folds them into the uniform
/// `{"exception": ...}` response envelope so every caller shares one inspection path.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timeout: request took longer than {0:?}")]
    Timeout(std::time::Duration),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("error, status: {0}")]
    Status(u16),

    #[error("Empty response body")]
    EmptyBody,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Errors surfaced to callers of the client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The server answered with an `exception` / `ExceptionMessage`.
    #[error("{0}")]
    Protocol(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Not connected: sign in first")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The object or query an action was bound to has been dropped.
    #[error("Action target is no longer available")]
    TargetDropped,

    #[error("Attribute is read-only: {0}")]
    ReadOnlyAttribute(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(err.to_string())
    }
}
