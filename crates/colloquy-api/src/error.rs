//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error shape and maps the
//! crates' error enums onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use colloquy_chat::ChatError;
use colloquy_core::error::ColloquyError;
use colloquy_speech::SpeechError;
use colloquy_vision::VisionError;

/// JSON error response body. Also the payload of SSE `error` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 404 Not Found - unknown or expired session.
    NotFound(String),
    /// 413 Payload Too Large - upload over the configured limit.
    PayloadTooLarge(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - a remote service failed.
    BadGateway(String),
    /// 503 Service Unavailable - feature disabled or device missing.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Internal(_) => "internal_error",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    pub fn into_body(self) -> ErrorBody {
        let error = self.code().to_string();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        };
        ErrorBody { error, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = ?self, "Request failed");
        }
        (status, Json(self.into_body())).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyQuery | ChatError::QueryTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Registry(_) => ApiError::Internal(err.to_string()),
            ChatError::Request(_)
            | ChatError::Status { .. }
            | ChatError::Blocked(_)
            | ChatError::Decode(_)
            | ChatError::Stream(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Disabled | SpeechError::Capture(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            SpeechError::Timeout(_) | SpeechError::Service(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

impl From<VisionError> for ApiError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Decode(_) => ApiError::BadRequest(err.to_string()),
            VisionError::Encode(_) => ApiError::Internal(err.to_string()),
            VisionError::Request(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<ColloquyError> for ApiError {
    fn from(err: ColloquyError) -> Self {
        match &err {
            ColloquyError::Config(msg) => ApiError::BadRequest(msg.clone()),
            ColloquyError::MissingCredential(msg) => ApiError::ServiceUnavailable(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
