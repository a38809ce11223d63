//! Centralized error handling.
//!
//! # Responsibilities
//! - Define the error type stages and handlers surface
//! - Run as the terminal pipeline stage: everything that failed upstream is
//!   shaped here, exactly once, by the injected [`ErrorHandler`]
//! - Record per-request metrics (single point that sees the final status)
//!
//! # Design Decisions
//! - Stages attach an [`ApiError`] to the response they short-circuit with;
//!   the boundary turns that into the client-facing representation
//! - Response shaping is a collaborator seam: the pipeline decides *that* a
//!   request failed, the handler decides what the client sees
//! - Headers already stamped upstream (security set, rate-limit state) are
//!   preserved through shaping

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error surfaced by a pipeline stage or a mounted handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed multipart payload: {0}")]
    MalformedUpload(String),

    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody(_) | Self::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    /// Attach the error to a bare response; the terminal stage shapes it.
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status();
        response.extensions_mut().insert(self);
        response
    }
}

/// Request metadata handed to the shaping collaborator.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
}

/// Response shaping collaborator.
///
/// Receives the surfaced error, the request metadata, and the response as
/// it left the chain. What the client ultimately sees is this policy's
/// decision alone.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &ApiError, request: &RequestMeta, response: Response) -> Response;
}

/// Default shaper: JSON envelope, upstream headers preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorHandler;

/// Wire shape of the default envelope.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
}

impl ErrorHandler for JsonErrorHandler {
    fn handle(&self, error: &ApiError, _request: &RequestMeta, response: Response) -> Response {
        let (mut parts, _) = response.into_parts();
        parts.status = error.status();
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let envelope = ErrorEnvelope {
            success: false,
            error: error.to_string(),
        };
        // Serializing a string-valued struct cannot fail.
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        Response::from_parts(parts, Body::from(body))
    }
}

/// Terminal pipeline stage.
///
/// Outermost layer: lets the whole chain run, then hands any surfaced
/// error to the collaborator and records request metrics.
pub async fn error_boundary(
    State(handler): State<Arc<dyn ErrorHandler>>,
    request: Request,
    next: Next,
) -> Response {
    let meta = RequestMeta {
        method: request.method().clone(),
        uri: request.uri().clone(),
    };
    let started = Instant::now();

    let mut response = next.run(request).await;

    if let Some(error) = response.extensions_mut().remove::<ApiError>() {
        tracing::debug!(
            method = %meta.method,
            path = %meta.uri.path(),
            error = %error,
            "Request failed"
        );
        response = handler.handle(&error, &meta, response);
    }

    crate::observability::metrics::record_request(
        meta.method.as_str(),
        response.status().as_u16(),
        started,
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::MalformedBody("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn shaper_preserves_upstream_headers() {
        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));

        let meta = RequestMeta {
            method: Method::GET,
            uri: Uri::from_static("/api/v1/bootcamps"),
        };
        let shaped = JsonErrorHandler.handle(&ApiError::NotFound, &meta, response);

        assert_eq!(shaped.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            shaped.headers().get("x-frame-options").unwrap(),
            "SAMEORIGIN"
        );
        assert_eq!(
            shaped.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
