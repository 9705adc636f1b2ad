//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps guard rejections and infrastructure failures to HTTP status codes
//! with machine-readable error codes in a JSON body. Internal error details
//! are never exposed in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use erogo_state::GuardRejection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses use this format across the API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "INVALID_STATE", "FORBIDDEN").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`].
///
/// The variants mirror the rejection taxonomy of the transition contract:
/// a caller can branch on the `code` field without parsing messages.
#[derive(Error, Debug)]
pub enum AppError {
    /// Entity unknown — or not readable by the caller. Both collapse to the
    /// same outward signal so existence is never leaked (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed: unknown action, missing mandatory note,
    /// malformed payment reference, malformed body (422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Identity claims missing or malformed (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role or community-scope violation; not retryable without a role
    /// change (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Stale-state conflict: the entity is not in the state the action
    /// departs from, or a concurrent transition won the conditional update.
    /// Retryable after a re-fetch (409).
    #[error("invalid state: {0}")]
    Conflict(String),

    /// Infrastructure failure. Message is logged but not returned (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        if let Self::Internal(_) = &self {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Map guard rejections to the API taxonomy. The guard's reason strings
/// are preserved verbatim in the message.
impl From<GuardRejection> for AppError {
    fn from(rejection: GuardRejection) -> Self {
        match rejection {
            GuardRejection::UnknownAction | GuardRejection::NoteRequired => {
                Self::Validation(rejection.to_string())
            }
            GuardRejection::InvalidStateForAction => Self::Conflict(rejection.to_string()),
            GuardRejection::NotAuthorized | GuardRejection::OutOfScope => {
                Self::Forbidden(rejection.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing request".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation("note required".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_FAILED");
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("missing claim".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn forbidden_status_code() {
        let err = AppError::Forbidden("out of scope".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "FORBIDDEN");
    }

    #[test]
    fn conflict_status_code() {
        let err = AppError::Conflict("invalid state for action".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "INVALID_STATE");
    }

    #[test]
    fn internal_status_code() {
        let err = AppError::Internal("db connection failed".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }

    #[test]
    fn guard_rejections_map_to_taxonomy() {
        let cases = [
            (GuardRejection::UnknownAction, StatusCode::UNPROCESSABLE_ENTITY),
            (GuardRejection::NoteRequired, StatusCode::UNPROCESSABLE_ENTITY),
            (GuardRejection::InvalidStateForAction, StatusCode::CONFLICT),
            (GuardRejection::NotAuthorized, StatusCode::FORBIDDEN),
            (GuardRejection::OutOfScope, StatusCode::FORBIDDEN),
        ];
        for (rejection, expected) in cases {
            let (status, _) = AppError::from(rejection).status_and_code();
            assert_eq!(status, expected, "{rejection:?}");
        }
    }

    #[test]
    fn guard_reason_strings_survive_mapping() {
        let err = AppError::from(GuardRejection::NoteRequired);
        assert!(err.to_string().contains("note required"));
        let err = AppError::from(GuardRejection::OutOfScope);
        assert!(err.to_string().contains("out of scope"));
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_conflict() {
        let (status, body) =
            response_parts(AppError::Conflict("invalid state for action".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "INVALID_STATE");
        assert!(body.error.message.contains("invalid state for action"));
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("request 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("request 123"));
    }
}
