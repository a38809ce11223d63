//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! Values come from the process environment (see `loader`); every section
//! carries the defaults used when a key is absent.

use std::path::PathBuf;

/// Deployment environment flag.
///
/// Anything other than `development` (case-insensitive), including an unset
/// variable, is treated as production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Development,
    #[default]
    Production,
}

impl AppEnv {
    /// Parse the `APP_ENV` value.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Root configuration for the API service.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Deployment environment (gates access logging).
    pub env: AppEnv,

    /// Listener configuration (port, request timeout).
    pub listener: ListenerConfig,

    /// Database collaborator settings.
    pub database: DatabaseConfig,

    /// Request body limits.
    pub body: BodyConfig,

    /// File upload limits.
    pub uploads: UploadConfig,

    /// Rate limiting policy.
    pub rate_limit: RateLimitConfig,

    /// Static asset serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Port to bind on all interfaces.
    pub port: u16,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ListenerConfig {
    /// Bind address string for the configured port.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            request_timeout_secs: 30,
        }
    }
}

/// Database collaborator configuration.
///
/// The connector itself is external; this only carries what the service
/// needs to invoke it before accepting traffic.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Connection URL handed to the connector, opaque to the pipeline.
    pub url: Option<String>,

    /// What to do when the connector fails at startup.
    pub on_failure: StartupPolicy,
}

/// Startup behavior when a required collaborator fails to come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupPolicy {
    /// Treat the failure as fatal and abort startup.
    #[default]
    Abort,
    /// Log a warning and continue serving.
    Continue,
}

impl StartupPolicy {
    /// Parse a policy name. Returns `None` for unrecognized values so the
    /// loader can fail fast instead of guessing.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "continue" => Some(Self::Continue),
            _ => None,
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone)]
pub struct BodyConfig {
    /// Maximum JSON body size in bytes.
    pub max_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024,
        }
    }
}

/// File upload limits.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum multipart payload size in bytes.
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1_000_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per client key per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 600_000,
            max_requests: 100,
        }
    }
}

/// Static asset serving configuration.
#[derive(Debug, Clone)]
pub struct StaticFilesConfig {
    /// Directory served as the router fallback.
    pub dir: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_parsing() {
        assert_eq!(AppEnv::parse("development"), AppEnv::Development);
        assert_eq!(AppEnv::parse("Development"), AppEnv::Development);
        assert_eq!(AppEnv::parse("production"), AppEnv::Production);
        assert_eq!(AppEnv::parse("staging"), AppEnv::Production);
        assert_eq!(AppEnv::default(), AppEnv::Production);
    }

    #[test]
    fn defaults_match_contract() {
        let config = AppConfig::default();
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.rate_limit.window_ms, 600_000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.database.on_failure, StartupPolicy::Abort);
    }

    #[test]
    fn startup_policy_parsing() {
        assert_eq!(StartupPolicy::parse("abort"), Some(StartupPolicy::Abort));
        assert_eq!(StartupPolicy::parse("CONTINUE"), Some(StartupPolicy::Continue));
        assert_eq!(StartupPolicy::parse("retry"), None);
    }
}
