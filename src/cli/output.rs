//! CLI output: error mapping from client errors to the CLI surface.

use crate::error::ClientError;

/// Map client errors to a string for CLI output.
pub fn map_error(e: &ClientError) -> String {
    match e {
        ClientError::Protocol(message) => format!("Server error: {}", message),
        ClientError::SessionExpired => "Session expired, sign in again".to_string(),
        other => other.to_string(),
    }
}
