//! Merge rules: defaults first, later sources override earlier ones.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the default values applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("service.environment", "Web")?
        .set_default("service.is_mobile", false)?
        .set_default("service.request_timeout_secs", 90)?
        .set_default("service.connect_timeout_secs", 10)?
        .set_default("service.language", "en")
}
