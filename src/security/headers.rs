//! Security response headers.
//!
//! # Responsibilities
//! - Add hardening headers to every response, short-circuits included
//! - Strip headers that advertise the server stack
//!
//! # Design Decisions
//! - Outermost application layer, so no later rejection can skip it
//! - Headers set by handlers are left alone
//! - Content-Security-Policy and Cross-Origin-Embedder-Policy are not sent;
//!   the front end is served by a separate host

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut());
    response
}

pub fn apply_security_headers(headers: &mut HeaderMap) {
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
    headers.remove("x-powered-by");
}
