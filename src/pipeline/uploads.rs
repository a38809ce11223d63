//! Multipart file-upload decoding stage.
//!
//! # Responsibilities
//! - Buffer `multipart/form-data` payloads up to the configured limit
//! - Decode every part once, up front, and carry the result as a request
//!   extension so handlers receive ready files instead of a raw stream
//! - Reject malformed multipart payloads with 400
//!
//! # Design Decisions
//! - The raw body is preserved downstream, so a handler that prefers the
//!   framework's own streaming extractor still can

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::UploadConfig;
use crate::http::error::ApiError;
use crate::pipeline::{probe, Stage};

/// One decoded file part.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field name.
    pub name: String,
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

/// Decoded multipart payload: file parts plus plain form fields.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    pub files: Vec<UploadedFile>,
    pub fields: Vec<(String, String)>,
}

/// Middleware function decoding multipart payloads.
pub async fn decode(
    State(config): State<UploadConfig>,
    request: Request,
    next: Next,
) -> Response {
    probe::mark(&request, Stage::Uploads);

    if !is_multipart(&request) {
        return next.run(request).await;
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

    let decode_request = Request::from_parts(parts.clone(), Body::from(bytes.clone()));
    let uploaded = match read_parts(decode_request).await {
        Ok(uploaded) => uploaded,
        Err(err) => return err.into_response(),
    };

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(uploaded);
    next.run(request).await
}

async fn read_parts(request: Request) -> Result<UploadedFiles, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| ApiError::MalformedUpload(rejection.to_string()))?;

    let mut uploaded = UploadedFiles::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::MalformedUpload(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::MalformedUpload(err.to_string()))?;
                uploaded.files.push(UploadedFile {
                    name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::MalformedUpload(err.to_string()))?;
                uploaded.fields.push((name, value));
            }
        }
    }
    Ok(uploaded)
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}
