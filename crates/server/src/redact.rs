//! Redaction of internal error responses.
//!
//! Internal errors routinely carry backend detail (bucket names,
//! endpoint URLs, SDK messages) that must not reach clients. This
//! middleware buffers the inner response; when the status is 500 it
//! replaces the body with a generic message carrying a correlation id
//! and logs the original body under the same id. Everything else
//! passes through byte-for-byte.

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;

fn trim_trailing_newline(body: &str) -> &str {
    body.strip_suffix('\n').unwrap_or(body)
}

pub async fn redact_internal_errors(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The inner body failed mid-stream; nothing has been sent
            // yet, so the whole response becomes an internal error.
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            Bytes::from(format!("error streaming response body: {err}"))
        }
    };

    if parts.status != StatusCode::INTERNAL_SERVER_ERROR {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let id: u32 = rand::thread_rng().gen_range(0..1_000_000);
    let original = String::from_utf8_lossy(&bytes);
    tracing::error!(
        id,
        path = %path,
        "internal error: {}",
        trim_trailing_newline(&original)
    );

    // The replacement body has a different length than whatever the
    // inner handler produced.
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(format!("internal error, id: {id}")))
}
