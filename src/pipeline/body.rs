//! JSON body decoding stage.
//!
//! # Responsibilities
//! - Buffer `application/json` bodies up to the configured limit
//! - Reject oversize payloads with 413 before anything downstream runs
//! - Parse the payload once and carry it as a request extension so later
//!   stages can rewrite it without re-reading the wire
//!
//! # Design Decisions
//! - Non-JSON requests pass through untouched (multipart is owned by the
//!   uploads stage)
//! - The extension and the raw body are kept in sync: any stage that
//!   mutates the parsed value must call [`rewrite_json_body`]

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::config::BodyConfig;
use crate::http::error::ApiError;
use crate::pipeline::{probe, Stage};

/// Parsed JSON request body, kept in sync with the raw bytes.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

/// Middleware function decoding JSON bodies.
pub async fn decode(
    State(config): State<BodyConfig>,
    request: Request,
    next: Next,
) -> Response {
    probe::mark(&request, Stage::Body);

    if !is_json(&request) {
        return next.run(request).await;
    }

    if let Some(length) = content_length(&request) {
        if length > config.max_bytes {
            return ApiError::PayloadTooLarge {
                limit: config.max_bytes,
            }
            .into_response();
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, config.max_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiError::PayloadTooLarge {
                limit: config.max_bytes,
            }
            .into_response()
        }
    };

    let mut request = Request::from_parts(parts, Body::from(bytes.clone()));
    if !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                request.extensions_mut().insert(JsonBody(value));
            }
            Err(err) => return ApiError::MalformedBody(err.to_string()).into_response(),
        }
    }

    next.run(request).await
}

/// Replace the request body with a re-serialized copy of `value` and update
/// the extension to match.
pub(crate) fn rewrite_json_body(request: &mut Request, value: Value) {
    // Serializing a serde_json::Value cannot fail.
    let bytes = serde_json::to_vec(&value).unwrap_or_default();
    request
        .headers_mut()
        .remove(header::CONTENT_LENGTH);
    *request.body_mut() = Body::from(bytes);
    request.extensions_mut().insert(JsonBody(value));
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false)
}

fn content_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}
