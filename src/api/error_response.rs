//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Default to 500 if we're directly converting an ApiError
        // (usually errors go through Error::into_response which has the status code)
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, TranscodeError};

    #[test]
    fn not_found_maps_to_404() {
        let error = Error::NotFound("task abc123 not found".to_string());
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), "not_found");
    }

    #[test]
    fn unsupported_domain_maps_to_400() {
        let error = Error::UnsupportedDomain {
            domain: "example.com".to_string(),
        };
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), "unsupported_domain");
    }

    #[test]
    fn invalid_transition_maps_to_409() {
        let error = Error::InvalidTransition {
            from: "completed".to_string(),
            to: "downloading".to_string(),
        };
        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), "invalid_transition");
    }

    #[test]
    fn file_too_large_maps_to_413() {
        let error = Error::FileTooLarge {
            size_bytes: 200,
            limit_bytes: 100,
        };
        assert_eq!(error.status_code(), 413);
        assert_eq!(error.error_code(), "file_too_large");
    }

    #[test]
    fn shutting_down_maps_to_503() {
        let error = Error::ShuttingDown;
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), "shutting_down");
    }

    #[test]
    fn fetch_failure_maps_to_502() {
        let error = Error::Fetch(FetchError::Failed {
            diagnostic: "ERROR: Video unavailable".to_string(),
        });
        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), "fetch_failed");
    }

    #[test]
    fn transcode_timeout_maps_to_504() {
        let error = Error::Transcode(TranscodeError::Timeout { seconds: 600 });
        assert_eq!(error.status_code(), 504);
        assert_eq!(error.error_code(), "transcode_timeout");
    }

    #[test]
    fn file_too_large_carries_details() {
        let error = Error::FileTooLarge {
            size_bytes: 200,
            limit_bytes: 100,
        };
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "file_too_large");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["size_bytes"], 200);
        assert_eq!(details["limit_bytes"], 100);
    }

    #[tokio::test]
    async fn error_into_response_produces_json_body() {
        let error = Error::NotFound("task abc123 not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let api_error: ApiError = serde_json::from_slice(&body).unwrap();

        assert_eq!(api_error.error.code, "not_found");
        assert!(api_error.error.message.contains("abc123"));
    }

    #[tokio::test]
    async fn invalid_format_response_lists_supported_formats() {
        let error = Error::InvalidFormat {
            format: "wav".to_string(),
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let api_error: ApiError = serde_json::from_slice(&body).unwrap();

        assert_eq!(api_error.error.code, "invalid_format");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["supported"], serde_json::json!(["mp3", "mp4"]));
    }
}
