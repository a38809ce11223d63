//! Configuration loading from the process environment.

use std::str::FromStr;

use crate::config::schema::{AppConfig, AppEnv, StartupPolicy};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Load the env file (if present), then build the configuration from the
/// process environment.
///
/// The env file is loaded before anything else reads the environment, so
/// keys defined there behave exactly like real environment variables.
pub fn from_env() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary key lookup.
///
/// Split out from [`from_env`] so tests can supply their own environment
/// without mutating process globals.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();

    if let Some(value) = lookup("APP_ENV") {
        config.env = AppEnv::parse(&value);
    }
    if let Some(value) = lookup("PORT") {
        config.listener.port = parse("PORT", &value)?;
    }
    if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
        config.listener.request_timeout_secs = parse("REQUEST_TIMEOUT_SECS", &value)?;
    }

    config.database.url = lookup("DATABASE_URL");
    if let Some(value) = lookup("DATABASE_ON_FAILURE") {
        config.database.on_failure =
            StartupPolicy::parse(&value).ok_or_else(|| ConfigError::Invalid {
                key: "DATABASE_ON_FAILURE",
                value,
            })?;
    }

    if let Some(value) = lookup("MAX_BODY_SIZE") {
        config.body.max_bytes = parse("MAX_BODY_SIZE", &value)?;
    }
    if let Some(value) = lookup("MAX_FILE_UPLOAD") {
        config.uploads.max_bytes = parse("MAX_FILE_UPLOAD", &value)?;
    }

    if let Some(value) = lookup("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse("RATE_LIMIT_WINDOW_MS", &value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse("RATE_LIMIT_MAX", &value)?;
    }

    if let Some(value) = lookup("PUBLIC_DIR") {
        config.static_files.dir = value.into();
    }

    if let Some(value) = lookup("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse("METRICS_ENABLED", &value)?;
    }
    if let Some(value) = lookup("METRICS_ADDR") {
        config.observability.metrics_address = value;
    }

    Ok(config)
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
