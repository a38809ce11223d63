//! Input sanitization stage.
//!
//! Strips operator-injection style keys (leading `$`, embedded `.`) from
//! the parsed JSON body and from query parameters, before anything
//! downstream can interpret them.

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;
use url::form_urlencoded;

use crate::pipeline::{body, probe, set_query, Stage};

/// Middleware function removing injection-style keys.
pub async fn strip(mut request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::Sanitize);

    let parsed = request
        .extensions()
        .get::<body::JsonBody>()
        .map(|body| body.0.clone());
    if let Some(mut value) = parsed {
        if sanitize_value(&mut value) {
            body::rewrite_json_body(&mut request, value);
        }
    }

    let rewritten = request
        .uri()
        .query()
        .map(|query| (query.to_string(), sanitize_query(query)));
    if let Some((original, cleaned)) = rewritten {
        if cleaned != original {
            set_query(&mut request, &cleaned);
        }
    }

    next.run(request).await
}

/// Remove injection-style keys from `value`, recursively. Returns whether
/// anything changed.
pub fn sanitize_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let rejected: Vec<String> = map
                .keys()
                .filter(|key| is_injection_key(key))
                .cloned()
                .collect();
            let mut changed = !rejected.is_empty();
            for key in rejected {
                map.remove(&key);
            }
            for nested in map.values_mut() {
                changed |= sanitize_value(nested);
            }
            changed
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                changed |= sanitize_value(item);
            }
            changed
        }
        _ => false,
    }
}

/// Drop injection-style keys from a query string.
pub fn sanitize_query(query: &str) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .filter(|(key, _)| !is_injection_key(key))
        .collect();
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn is_injection_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}
