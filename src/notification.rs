//! Notifications attached to objects and queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationType {
    #[default]
    Error,
    Notice,
    #[serde(rename = "OK")]
    Ok,
    Warning,
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Error" | "0" => Ok(NotificationType::Error),
            "Notice" | "1" => Ok(NotificationType::Notice),
            "OK" | "Ok" | "2" => Ok(NotificationType::Ok),
            "Warning" | "3" => Ok(NotificationType::Warning),
            other => Err(format!("Unknown notification type: {}", other)),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationType::Error => "Error",
            NotificationType::Notice => "Notice",
            NotificationType::Ok => "OK",
            NotificationType::Warning => "Warning",
        };
        f.write_str(name)
    }
}

impl NotificationType {
    /// Parse a wire value; missing or unknown values count as errors.
    pub fn from_wire(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

/// The single current notification of an object or query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationType,
}

impl Notification {
    /// Blank messages clear the notification.
    pub fn new(message: Option<&str>, kind: NotificationType) -> Option<Self> {
        message
            .filter(|m| !m.trim().is_empty())
            .map(|m| Notification {
                message: m.to_string(),
                kind,
            })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            message: message.into(),
            kind: NotificationType::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationType::Error
    }
}
