//! Response bodies shared by middleware and terminal handlers.
//!
//! # Design Decisions
//! - Every error leaves the server as `{"message": ...}` JSON
//! - `error` carries internal detail and is only ever set outside production

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub const NOT_FOUND_MESSAGE: &str = "Route not found";
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong!";
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";
pub const CORS_REJECTED_MESSAGE: &str = "Not allowed by CORS";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Payload too large";
pub const BAD_BODY_MESSAGE: &str = "Invalid request body";

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error = Some(detail.into());
        self
    }
}

/// Build a JSON error response.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// Terminal handler for every unmatched method and path.
pub async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}
