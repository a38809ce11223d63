//! Duplicate query parameter collapsing stage.
//!
//! A polluted query like `?role=admin&role=user` reaches handlers as a
//! single value per key. The last occurrence wins; key order follows first
//! appearance. Keys on the whitelist keep every occurrence (some handlers
//! legitimately accept repeats).

use std::collections::HashMap;

use axum::{extract::Request, middleware::Next, response::Response};
use url::form_urlencoded;

use crate::pipeline::{probe, set_query, Stage};

/// Middleware function collapsing duplicate query keys.
pub async fn collapse(mut request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::ParamPollution);

    let rewritten = request
        .uri()
        .query()
        .map(|query| (query.to_string(), collapse_query(query, &[])));
    if let Some((original, collapsed)) = rewritten {
        if collapsed != original {
            set_query(&mut request, &collapsed);
        }
    }

    next.run(request).await
}

/// Collapse duplicate keys in a query string, keeping the last value.
pub fn collapse_query(query: &str, whitelist: &[&str]) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let mut last_value: HashMap<&str, &str> = HashMap::new();
    for (key, value) in &pairs {
        last_value.insert(key.as_str(), value.as_str());
    }

    let mut emitted: Vec<&str> = Vec::new();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        if whitelist.contains(&key.as_str()) {
            serializer.append_pair(key, value);
        } else if !emitted.contains(&key.as_str()) {
            emitted.push(key);
            serializer.append_pair(key, last_value[key.as_str()]);
        }
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_occurrence_wins() {
        assert_eq!(
            collapse_query("role=admin&role=user", &[]),
            "role=user".to_string()
        );
    }

    #[test]
    fn first_seen_key_order_preserved() {
        assert_eq!(
            collapse_query("a=1&b=2&a=3", &[]),
            "a=3&b=2".to_string()
        );
    }

    #[test]
    fn whitelisted_keys_keep_all_occurrences() {
        assert_eq!(
            collapse_query("tag=x&tag=y&role=a&role=b", &["tag"]),
            "tag=x&tag=y&role=b".to_string()
        );
    }

    #[test]
    fn singleton_keys_untouched() {
        assert_eq!(collapse_query("select=name", &[]), "select=name".to_string());
    }
}
