//! Access logging stage, development only.
//!
//! Emits one structured line per completed request. The stage is gated at
//! wiring time by the environment flag, so production builds never pay for
//! it; see `PipelinePlan`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};

use crate::pipeline::{probe, request_id::X_REQUEST_ID, Stage};

/// Middleware function logging one line per request.
pub async fn log(request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::AccessLog);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let started = Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        target: "access",
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        client = %client,
        request_id = %request_id,
        "request"
    );

    response
}
