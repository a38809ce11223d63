//! Cookie parsing stage.

use std::collections::HashMap;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};

use crate::pipeline::{probe, Stage};

/// Request cookies parsed from the `Cookie` header.
///
/// Always present downstream of this stage; empty when the client sent no
/// cookies.
#[derive(Debug, Clone, Default)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Middleware function parsing the `Cookie` header into an extension.
pub async fn parse(mut request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::Cookies);

    let cookies = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(parse_header)
        .unwrap_or_default();
    request.extensions_mut().insert(cookies);

    next.run(request).await
}

fn parse_header(header: &str) -> Cookies {
    let mut map = HashMap::new();
    for pair in header.split(';') {
        if let Some((name, value)) = pair.split_once('=') {
            map.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    Cookies(map)
}
