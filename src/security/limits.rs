//! Request body size ceiling.
//!
//! # Responsibilities
//! - Reject bodies larger than the configured ceiling with 413
//! - Buffer the body so handlers behind this layer see a complete payload
//!
//! # Design Decisions
//! - A declared `Content-Length` over the limit is rejected before reading
//! - Chunked bodies are read up to the limit and rejected on overflow
//! - Applies to every path, including ones that end in 404

use std::error::Error as StdError;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;

use crate::http::response::{json_error, BAD_BODY_MESSAGE, PAYLOAD_TOO_LARGE_MESSAGE};

fn declared_length(request: &Request<Body>) -> Option<u64> {
    request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn exceeded_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

pub async fn body_limit_middleware(
    State(limit): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(length) = declared_length(&request) {
        if length > limit as u64 {
            tracing::debug!(length, limit, "Declared body exceeds limit");
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE_MESSAGE);
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) if exceeded_limit(&e) => {
            tracing::debug!(limit, "Streamed body exceeds limit");
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE_MESSAGE);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read request body");
            return json_error(StatusCode::BAD_REQUEST, BAD_BODY_MESSAGE);
        }
    };

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
