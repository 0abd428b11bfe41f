//! Terminal error handling.
//!
//! # Responsibilities
//! - Give handlers one error type to return (`AppError`)
//! - Turn handler errors and panics into a uniform 500 body
//! - Log the detail once, with the request id
//!
//! # Design Decisions
//! - Errors travel outward as a `FaultDetail` response extension; the boundary
//!   is the only place that renders them
//! - Detail is included in the body only outside production
//! - A store outage is not a fault: it is answered 503 directly
//!
//! # Data Flow
//! ```text
//! handler → Err(AppError) → 500 + FaultDetail ┐
//! handler → panic → CatchPanicLayer → 500 + FaultDetail ┤
//!                                              ▼
//!                          fault_boundary → log → {"message", "error"?}
//! ```

use std::any::Any;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::http::request::request_id;
use crate::http::response::{json_error, ErrorBody, INTERNAL_ERROR_MESSAGE, UNAVAILABLE_MESSAGE};
use crate::store::StoreError;

/// Error type for route handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Internal detail of an unhandled failure, attached to its response.
#[derive(Debug, Clone)]
pub struct FaultDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Store(StoreError::Unavailable) => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE)
            }
            AppError::Store(err) => fault_response(err.to_string()),
            AppError::Internal(err) => fault_response(format!("{err:#}")),
        }
    }
}

fn fault_response(detail: String) -> Response {
    let mut response = json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
    response.extensions_mut().insert(FaultDetail(detail));
    response
}

/// Panic handler for `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "handler panicked".to_string()
    };
    fault_response(format!("panic: {detail}"))
}

/// How much of a fault the boundary reveals.
#[derive(Debug, Clone, Copy)]
pub struct FaultPolicy {
    pub expose_detail: bool,
}

pub async fn fault_boundary(
    State(policy): State<FaultPolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request_id(&request).unwrap_or("-").to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(FaultDetail(detail)) = response.extensions_mut().remove::<FaultDetail>() else {
        return response;
    };

    tracing::error!(
        request_id = %request_id,
        method = %method,
        path = %path,
        error = %detail,
        "Unhandled request failure"
    );

    let mut body = ErrorBody::new(INTERNAL_ERROR_MESSAGE);
    if policy.expose_detail {
        body = body.with_detail(detail);
    }

    // Keep headers set further in (CORS, rate limit) on the rewritten response.
    let (parts, _) = response.into_parts();
    let mut rendered = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    for (name, value) in parts.headers.iter() {
        if name == CONTENT_TYPE || name == CONTENT_LENGTH {
            continue;
        }
        rendered.headers_mut().append(name.clone(), value.clone());
    }
    rendered
}
