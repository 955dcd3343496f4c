//! Configuration System
//!
//! Layered configuration for the client: built-in defaults, the global config file, an optional
//! explicit file, then `OBJSYNC__*` environment variables.

use crate::error::ClientError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjsyncConfig {
    /// Application server connection settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URI of the service, e.g. `https://demo.example.com/`
    #[serde(default)]
    pub uri: String,

    /// Client environment name sent with every request
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub is_mobile: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Two-letter language used for transport failure messages
    #[serde(default = "default_language")]
    pub language: String,

    /// Device identifier; enables signed `uniqueId`/`timestamp` envelope fields
    #[serde(default)]
    pub unique_id: Option<String>,
}

fn default_environment() -> String {
    "Web".to_string()
}

fn default_request_timeout_secs() -> u64 {
    90
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            environment: default_environment(),
            is_mobile: false,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            language: default_language(),
            unique_id: None,
        }
    }
}

impl ServiceConfig {
    /// Convenience constructor used by tests and the demo binary.
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Endpoint URL for a service method; the base URI always ends up with one `/`.
    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.uri.trim_end_matches('/'), method)
    }

    /// Validate the service configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.uri.trim().is_empty() {
            errors.push("Service uri cannot be empty".to_string());
        } else if !(self.uri.starts_with("http://") || self.uri.starts_with("https://")) {
            errors.push(format!("Service uri must be http(s): {}", self.uri));
        }
        if self.environment.trim().is_empty() {
            errors.push("Environment cannot be empty".to_string());
        }
        if self.request_timeout_secs == 0 {
            errors.push("Request timeout must be greater than zero".to_string());
        }
        if self.language.len() != 2 {
            errors.push(format!("Language must be a two-letter code: {}", self.language));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`ObjsyncConfig`] from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global file, and environment overrides.
    pub fn load() -> Result<ObjsyncConfig, ClientError> {
        Self::load_with(None)
    }

    /// Like [`ConfigLoader::load`], with an explicit file layered over the global one.
    pub fn load_with(explicit: Option<&Path>) -> Result<ObjsyncConfig, ClientError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = sources::explicit_file::add_to_builder(builder, path)?;
        }
        builder = builder.add_source(
            config::Environment::with_prefix("OBJSYNC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ObjsyncConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load and validate in one step.
    pub fn load_validated(explicit: Option<&Path>) -> Result<ObjsyncConfig, ClientError> {
        let config = Self::load_with(explicit)?;
        config.service.validate().map_err(|errors| {
            ClientError::Config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            ))
        })?;
        Ok(config)
    }
}
