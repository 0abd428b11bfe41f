//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header shared by every layer
//! - Read the assigned request id back for logs and error reports
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is kept, not replaced

use axum::http::{HeaderName, Request};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id assigned by `SetRequestIdLayer`, if any.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
}

/// Span for a single request, tagged with its id.
pub fn make_request_span<B>(request: &Request<B>) -> tracing::Span {
    tracing::info_span!(
        "http",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id(request).unwrap_or("-"),
    )
}
