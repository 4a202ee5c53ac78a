//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::Request,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::routing::REQUEST_BODY_LIMIT;

/// The number of bytes of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the response body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and logged at the `debug` level.
/// Inline attachments anywhere in JSON bodies are replaced with their size.
/// Bodies over [REQUEST_BODY_LIMIT] bytes, or of unknown length, are passed
/// on without being read or logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let body = match buffer(body).await {
        Ok(Buffered::Bytes(bytes)) => {
            log_request(&parts, &body_text(parts.headers.get(CONTENT_TYPE), &bytes));
            Body::from(bytes)
        }
        Ok(Buffered::Unread(body)) => {
            tracing::info!("Received request: {parts:#?}\nbody: <not logged>");
            body
        }
        Err(error) => {
            tracing::warn!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let response = next.run(Request::from_parts(parts, body)).await;
    let (parts, body) = response.into_parts();

    let body = match buffer(body).await {
        Ok(Buffered::Bytes(bytes)) => {
            log_response(&parts, &body_text(parts.headers.get(CONTENT_TYPE), &bytes));
            Body::from(bytes)
        }
        Ok(Buffered::Unread(body)) => {
            tracing::info!("Sending response: {parts:#?}\nbody: <not logged>");
            body
        }
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Response::from_parts(parts, body)
}

enum Buffered {
    Bytes(Bytes),
    Unread(Body),
}

/// Read `body` into memory if its length is known and at most
/// [REQUEST_BODY_LIMIT] bytes.
async fn buffer(body: Body) -> Result<Buffered, axum::Error> {
    match body.size_hint().upper() {
        Some(length) if length <= REQUEST_BODY_LIMIT as u64 => {
            let bytes = axum::body::to_bytes(body, REQUEST_BODY_LIMIT).await?;
            Ok(Buffered::Bytes(bytes))
        }
        _ => Ok(Buffered::Unread(body)),
    }
}

fn body_text(content_type: Option<&HeaderValue>, bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);

    if is_json(content_type) {
        redact_attachments(&text)
    } else {
        text.into_owned()
    }
}

fn is_json(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Replace every `data:` URL under an `attachment` field of a JSON document
/// with a placeholder stating its length.
///
/// Request bodies carry the attachment as a plain string, responses carry it
/// as `{"kind": "inline", "value": "data:..."}` nested in a report.
fn redact_attachments(body_text: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_string();
    };

    if redact_value(&mut json, false) {
        json.to_string()
    } else {
        body_text.to_string()
    }
}

fn redact_value(value: &mut Value, in_attachment: bool) -> bool {
    match value {
        Value::String(text) if in_attachment && text.starts_with("data:") => {
            *text = format!("<inline attachment, {} bytes>", text.len());
            true
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |redacted, item| redact_value(item, in_attachment) | redacted),
        Value::Object(fields) => fields.iter_mut().fold(false, |redacted, (key, field)| {
            redact_value(field, in_attachment || key == "attachment") | redacted
        }),
        _ => false,
    }
}

/// The longest prefix of `body` that fits in [LOG_BODY_LENGTH_LIMIT] bytes
/// without splitting a character.
fn truncate(body: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(body.len());

    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(headers: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(headers: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {headers:#?}\nbody: {body:?}");
    }
}
