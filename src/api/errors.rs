//! API Error Handling
//!
//! Structured error responses with proper HTTP status codes and request tracking.

use super::middleware::RequestId;
use crate::errors::{AuthError, BingoError, GameError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, FORBIDDEN, etc.)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Response extension carrying the error code, read by the metrics middleware
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode(pub &'static str);

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    RequestTimeout(String),
    InternalError(String),
    ServiceUnavailable(String),
}

impl ApiErrorKind {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiErrorKind::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiErrorKind::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiErrorKind::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiErrorKind::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiErrorKind::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiErrorKind::RequestTimeout(_) => (StatusCode::REQUEST_TIMEOUT, "REQUEST_TIMEOUT"),
            ApiErrorKind::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiErrorKind::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiErrorKind::BadRequest(m)
            | ApiErrorKind::Unauthorized(m)
            | ApiErrorKind::Forbidden(m)
            | ApiErrorKind::NotFound(m)
            | ApiErrorKind::Conflict(m)
            | ApiErrorKind::RequestTimeout(m)
            | ApiErrorKind::InternalError(m)
            | ApiErrorKind::ServiceUnavailable(m) => m,
        }
    }
}

impl ApiError {
    fn new(request_id: String, kind: ApiErrorKind) -> Self {
        Self {
            kind,
            request_id,
            details: None,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::BadRequest(message))
    }

    pub fn unauthorized(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::Unauthorized(message))
    }

    pub fn not_found(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::NotFound(message))
    }

    pub fn request_timeout(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::RequestTimeout(message))
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::InternalError(message))
    }

    pub fn service_unavailable(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::ServiceUnavailable(message))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Map a library error onto its HTTP class; messages pass through verbatim
    pub fn from_bingo(request_id: String, err: BingoError) -> Self {
        let message = err.to_string();
        let kind = match err {
            BingoError::Validation(_) => ApiErrorKind::BadRequest(message),
            BingoError::Auth(AuthError::NotAuthenticated | AuthError::InvalidCredentials) => {
                ApiErrorKind::Unauthorized(message)
            }
            BingoError::Auth(AuthError::AccountExists(_)) => ApiErrorKind::Conflict(message),
            BingoError::Auth(AuthError::NoRoleAssigned | AuthError::Forbidden { .. }) => {
                ApiErrorKind::Forbidden(message)
            }
            BingoError::NotFound(_) => ApiErrorKind::NotFound(message),
            BingoError::Game(GameError::NumberOutOfRange(_)) => ApiErrorKind::BadRequest(message),
            BingoError::Game(GameError::SessionLimitReached(_)) => {
                ApiErrorKind::ServiceUnavailable(message)
            }
            BingoError::Game(_) => ApiErrorKind::Conflict(message),
            BingoError::Backend(StorageError::Conflict { .. }) => ApiErrorKind::Conflict(message),
            BingoError::Backend(_) | BingoError::Configuration(_) => {
                error!(request_id = %request_id, "Backend failure: {}", message);
                ApiErrorKind::InternalError(message)
            }
        };
        Self::new(request_id, kind)
    }
}

/// Attach the request id while converting library errors
pub trait ResultExt<T> {
    fn or_api(self, request_id: &RequestId) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T, BingoError> {
    fn or_api(self, request_id: &RequestId) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_bingo(request_id.0.clone(), e))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, _) = self.kind.status_and_code();
        write!(f, "[{}] {}: {}", self.request_id, status, self.kind.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.kind.status_and_code();
        if status.is_client_error() {
            warn!(request_id = %self.request_id, code, "{}", self.kind.message());
        }

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message: self.kind.message().to_string(),
                details: self.details,
            },
        });

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorCode(code));
        response
    }
}
