//! Security response headers stage.
//!
//! # Responsibilities
//! - Stamp a fixed hardening header set on every response, including
//!   short-circuited ones produced by inner stages
//!
//! # Design Decisions
//! - Headers are overwritten, not merged: the pipeline owns these values
//! - The set mirrors the conventional hardening defaults for JSON APIs

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::pipeline::{probe, Stage};

const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    (
        "strict-transport-security",
        "max-age=15552000; includeSubDomains",
    ),
    ("x-xss-protection", "1; mode=block"),
];

/// Middleware function applying the hardening header set.
pub async fn apply(request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::SecurityHeaders);

    let mut response = next.run(request).await;
    for (name, value) in SECURITY_HEADERS {
        response.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}
