//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → request_id.rs  (assign + propagate x-request-id)
//!     → timeout        (tower-http, per-request deadline)
//!     → body.rs        (JSON body decode + size limit)
//!     → cookies.rs     (Cookie header → extension map)
//!     → access_log.rs  (development only)
//!     → uploads.rs     (multipart decode + size limit)
//!     → sanitize.rs    (operator-injection key stripping)
//!     → headers.rs     (security response headers)
//!     → xss.rs         (markup escaping of reflected input)
//!     → rate_limit.rs  (fixed-window admission per client key)
//!     → param_pollution.rs (duplicate query key collapse)
//!     → CORS           (tower-http, permissive)
//!     → static files / mounted routes
//!     → error boundary shapes anything that failed on the way out
//! ```
//!
//! # Design Decisions
//! - Stage order is data, not convention: `PipelinePlan` is built once from
//!   config and the router assembly consumes it verbatim
//! - A stage either passes the request on, mutates it in place, or
//!   short-circuits with its own response
//! - Stages announce themselves to an optional [`probe::StageProbe`] so
//!   ordering is observable from tests

pub mod access_log;
pub mod body;
pub mod cookies;
pub mod headers;
pub mod param_pollution;
pub mod probe;
pub mod rate_limit;
pub mod request_id;
pub mod sanitize;
pub mod uploads;
pub mod xss;

use axum::extract::Request;
use axum::http::Uri;

use crate::config::AppConfig;

/// Rewrite the request's query string in place, keeping the path.
///
/// Used by the stages that rewrite queries (sanitize, xss, collapse). The
/// input comes out of `form_urlencoded`, so it is already percent-encoded;
/// an unparsable result leaves the URI unchanged.
pub(crate) fn set_query(request: &mut Request, query: &str) {
    let path = request.uri().path();
    let path_and_query = if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    };
    let mut parts = request.uri().clone().into_parts();
    if let Ok(new_path_and_query) = path_and_query.parse() {
        parts.path_and_query = Some(new_path_and_query);
        if let Ok(uri) = Uri::from_parts(parts) {
            *request.uri_mut() = uri;
        }
    }
}

/// One unit in the ordered request-processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestId,
    Timeout,
    Body,
    Cookies,
    AccessLog,
    Uploads,
    Sanitize,
    SecurityHeaders,
    XssFilter,
    RateLimit,
    ParamPollution,
    Cors,
    StaticFiles,
    Routes,
    ErrorHandler,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestId => "request-id",
            Self::Timeout => "timeout",
            Self::Body => "body",
            Self::Cookies => "cookies",
            Self::AccessLog => "access-log",
            Self::Uploads => "uploads",
            Self::Sanitize => "sanitize",
            Self::SecurityHeaders => "security-headers",
            Self::XssFilter => "xss-filter",
            Self::RateLimit => "rate-limit",
            Self::ParamPollution => "param-pollution",
            Self::Cors => "cors",
            Self::StaticFiles => "static-files",
            Self::Routes => "routes",
            Self::ErrorHandler => "error-handler",
        }
    }
}

/// A stage plus whether the current configuration enables it.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub stage: Stage,
    pub enabled: bool,
}

/// The ordered stage list for one process lifetime.
///
/// Built once at startup, immutable thereafter. Access logging is the only
/// conditional stage: it is enabled in development and absent otherwise.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    stages: Vec<StageDescriptor>,
}

impl PipelinePlan {
    pub fn new(config: &AppConfig) -> Self {
        let on = |stage| StageDescriptor {
            stage,
            enabled: true,
        };
        let stages = vec![
            on(Stage::RequestId),
            on(Stage::Timeout),
            on(Stage::Body),
            on(Stage::Cookies),
            StageDescriptor {
                stage: Stage::AccessLog,
                enabled: config.env.is_development(),
            },
            on(Stage::Uploads),
            on(Stage::Sanitize),
            on(Stage::SecurityHeaders),
            on(Stage::XssFilter),
            on(Stage::RateLimit),
            on(Stage::ParamPollution),
            on(Stage::Cors),
            on(Stage::StaticFiles),
            on(Stage::Routes),
            on(Stage::ErrorHandler),
        ];
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Whether the given stage is part of the chain under this plan.
    pub fn is_active(&self, stage: Stage) -> bool {
        self.stages
            .iter()
            .any(|descriptor| descriptor.stage == stage && descriptor.enabled)
    }

    /// Enabled stages in execution order.
    pub fn active_order(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|descriptor| descriptor.enabled)
            .map(|descriptor| descriptor.stage)
            .collect()
    }

    /// Startup log rendering, e.g. `request-id → timeout → body → …`.
    pub fn describe(&self) -> String {
        self.active_order()
            .iter()
            .map(|stage| stage.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AppEnv};

    fn plan_for(env: AppEnv) -> PipelinePlan {
        let config = AppConfig {
            env,
            ..AppConfig::default()
        };
        PipelinePlan::new(&config)
    }

    #[test]
    fn access_log_present_only_in_development() {
        assert!(plan_for(AppEnv::Development).is_active(Stage::AccessLog));
        assert!(!plan_for(AppEnv::Production).is_active(Stage::AccessLog));
    }

    #[test]
    fn sanitize_runs_before_duplicate_collapse() {
        let order = plan_for(AppEnv::Production).active_order();
        let sanitize = order.iter().position(|&s| s == Stage::Sanitize).unwrap();
        let collapse = order
            .iter()
            .position(|&s| s == Stage::ParamPollution)
            .unwrap();
        assert!(sanitize < collapse);
    }

    #[test]
    fn error_handler_is_terminal() {
        let order = plan_for(AppEnv::Production).active_order();
        assert_eq!(*order.last().unwrap(), Stage::ErrorHandler);
    }

    #[test]
    fn body_decodes_before_sanitize() {
        let order = plan_for(AppEnv::Development).active_order();
        let body = order.iter().position(|&s| s == Stage::Body).unwrap();
        let sanitize = order.iter().position(|&s| s == Stage::Sanitize).unwrap();
        assert!(body < sanitize);
    }
}
