//! Markup escaping stage.
//!
//! HTML-escapes string values in the parsed JSON body and in query
//! parameters, so reflected input cannot carry markup into a consumer.
//! Keys are left alone; the sanitize stage already rejects the dangerous
//! ones.

use std::borrow::Cow;

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;
use url::form_urlencoded;

use crate::pipeline::{body, probe, set_query, Stage};

/// Middleware function escaping markup in reflected input.
pub async fn escape(mut request: Request, next: Next) -> Response {
    probe::mark(&request, Stage::XssFilter);

    let parsed = request
        .extensions()
        .get::<body::JsonBody>()
        .map(|body| body.0.clone());
    if let Some(mut value) = parsed {
        if escape_value(&mut value) {
            body::rewrite_json_body(&mut request, value);
        }
    }

    let rewritten = request
        .uri()
        .query()
        .map(|query| (query.to_string(), escape_query(query)));
    if let Some((original, escaped)) = rewritten {
        if escaped != original {
            set_query(&mut request, &escaped);
        }
    }

    next.run(request).await
}

/// Escape string values in `value`, recursively. Returns whether anything
/// changed.
pub fn escape_value(value: &mut Value) -> bool {
    match value {
        Value::String(text) => match escape_text(text) {
            Cow::Borrowed(_) => false,
            Cow::Owned(escaped) => {
                *text = escaped;
                true
            }
        },
        Value::Object(map) => {
            let mut changed = false;
            for nested in map.values_mut() {
                changed |= escape_value(nested);
            }
            changed
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                changed |= escape_value(item);
            }
            changed
        }
        _ => false,
    }
}

/// Escape markup characters, leaving clean text unallocated.
pub fn escape_text(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let mut escaped = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

fn escape_query(query: &str) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .map(|(key, value)| (key, escape_text(&value).into_owned()))
        .collect();
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_text("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
    }

    #[test]
    fn ampersand_escaped_first() {
        assert_eq!(escape_text("a&b<c"), "a&amp;b&lt;c");
    }

    #[test]
    fn clean_text_is_borrowed() {
        assert!(matches!(escape_text("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn escapes_nested_body_strings() {
        let mut value = json!({"name": "<b>x</b>", "deep": {"bio": "a>b"}, "n": 3});
        assert!(escape_value(&mut value));
        assert_eq!(
            value,
            json!({"name": "&lt;b&gt;x&lt;/b&gt;", "deep": {"bio": "a&gt;b"}, "n": 3})
        );
    }
}
