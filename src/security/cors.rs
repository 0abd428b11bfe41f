//! Cross-origin policy middleware.
//!
//! # Responsibilities
//! - Reject requests whose `Origin` is not on the allow-list
//! - Answer preflight requests from allowed origins
//! - Add `Access-Control-*` headers to allowed responses
//!
//! # Design Decisions
//! - Rejection is an explicit 403, not a silently missing header
//! - The allow-list is resolved from config once; no environment checks here
//! - Runs before rate limiting and body parsing

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::response::{json_error, CORS_REJECTED_MESSAGE};

const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Resolved cross-origin policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    allow_any: bool,
    allow_credentials: bool,
    require_origin: bool,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            allow_any: config.allowed_origins.iter().any(|origin| origin == "*"),
            allowed_origins: config
                .allowed_origins
                .iter()
                .filter(|origin| origin.as_str() != "*")
                .cloned()
                .collect(),
            allow_credentials: config.allow_credentials,
            require_origin: config.require_origin.unwrap_or(true),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allow_any || self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    fn decorate(&self, headers: &mut HeaderMap, origin: &HeaderValue) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        if self.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = match request.headers().get(ORIGIN) {
        Some(origin) => origin.clone(),
        None if policy.require_origin => {
            tracing::debug!(path = %request.uri().path(), "Request without Origin rejected");
            return json_error(StatusCode::FORBIDDEN, CORS_REJECTED_MESSAGE);
        }
        None => return next.run(request).await,
    };

    let allowed = origin
        .to_str()
        .map(|value| policy.allows(value))
        .unwrap_or(false);
    if !allowed {
        tracing::debug!(origin = ?origin, "Origin not allowed");
        return json_error(StatusCode::FORBIDDEN, CORS_REJECTED_MESSAGE);
    }

    // Preflight
    if request.method() == Method::OPTIONS
        && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        policy.decorate(headers, &origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            headers.append(
                VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        return response;
    }

    let mut response = next.run(request).await;
    policy.decorate(response.headers_mut(), &origin);
    response
}
