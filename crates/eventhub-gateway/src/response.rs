//! Response envelopes and the handler error type.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eventhub_core::{EventId, StoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// Success envelope: `{"message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Human-readable outcome.
    pub message: String,
    /// Payload, omitted when there is none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope with a payload.
    pub fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    /// Envelope with a message only.
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
            data: None,
        })
    }
}

/// Error envelope: `{"message": ..., "error": ..., "code": ...}`.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub message: &'static str,
    pub error: String,
    pub code: &'static str,
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Handler errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Request body failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Request could not be parsed.
    #[error("{0}")]
    BadRequest(String),

    /// Event does not exist.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Too many login attempts for one email.
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Other internal failure.
    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Auth(auth) => return auth.into_response(),
            Self::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Could not parse request data",
            ),
            Self::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Could not parse request data",
            ),
            Self::EventNotFound(_) | Self::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found", "Could not find event")
            }
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests",
            ),
            Self::Store(StoreError::Conflict(_)) => {
                (StatusCode::CONFLICT, "conflict", "Resource already exists")
            }
            Self::Store(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };

        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { message, error, code })).into_response()
    }
}
