//! Error types for vidxpress
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Fetch, Transcode, validation)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for vidxpress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vidxpress
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// The submitted URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL's host is not on the configured allow-list
    #[error("unsupported domain: {domain}")]
    UnsupportedDomain {
        /// The host that was rejected
        domain: String,
    },

    /// The requested output format is not supported
    #[error("unsupported output format: {format}")]
    InvalidFormat {
        /// The format string that was rejected
        format: String,
    },

    /// Media fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transcode failed
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Fetched media exceeds the configured size cap
    #[error("file too large: {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    FileTooLarge {
        /// Actual size of the fetched file
        size_bytes: u64,
        /// Configured maximum
        limit_bytes: u64,
    },

    /// Task not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A task status update would move backward or out of a terminal state
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Rejected target status
        to: String,
    },

    /// Shutdown in progress - not accepting new conversions
    #[error("shutdown in progress: not accepting new conversions")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Errors from driving the media fetch tool
#[derive(Debug, Error)]
pub enum FetchError {
    /// The yt-dlp binary could not be located
    #[error("yt-dlp binary not found (install yt-dlp or set fetch.ytdlp_path)")]
    BinaryMissing,

    /// The fetch process could not be started or driven
    #[error("failed to run yt-dlp: {0}")]
    Spawn(String),

    /// The fetch process exited with a failure
    #[error("yt-dlp failed: {diagnostic}")]
    Failed {
        /// Last diagnostic line from the tool's stderr
        diagnostic: String,
    },

    /// The metadata dump was not valid JSON
    #[error("metadata output was not valid JSON: {0}")]
    InvalidMetadata(String),

    /// The fetch process reported success but produced no file
    #[error("fetch produced no output file")]
    MissingOutput,

    /// The fetch exceeded its configured timeout
    #[error("fetch timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        seconds: u64,
    },
}

/// Errors from driving the transcode tool
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The ffmpeg binary could not be located
    #[error("ffmpeg binary not found (install ffmpeg or set transcode.ffmpeg_path)")]
    BinaryMissing,

    /// The transcode process could not be started or driven
    #[error("failed to run ffmpeg: {0}")]
    Spawn(String),

    /// The transcode process exited with a failure
    #[error("ffmpeg failed: {diagnostic}")]
    Failed {
        /// Last diagnostic line from the tool's stderr
        diagnostic: String,
    },

    /// The transcode process reported success but produced no file
    #[error("transcode produced no output file")]
    MissingOutput,

    /// The transcode exceeded its configured timeout
    #[error("transcode timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        seconds: u64,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "file_too_large",
///     "message": "file too large: 150000000 bytes exceeds the 104857600 byte limit",
///     "details": {
///       "size_bytes": 150000000,
///       "limit_bytes": 104857600
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "unsupported_domain")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,
            Error::UnsupportedDomain { .. } => 400,
            Error::InvalidFormat { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - Lifecycle violations
            Error::InvalidTransition { .. } => 409,

            // 413 Payload Too Large
            Error::FileTooLarge { .. } => 413,

            // Fetch errors: the external tool is the gateway to the source
            Error::Fetch(FetchError::BinaryMissing) => 503,
            Error::Fetch(FetchError::Timeout { .. }) => 504,
            Error::Fetch(_) => 502,

            // Transcode errors are server-side
            Error::Transcode(TranscodeError::BinaryMissing) => 503,
            Error::Transcode(TranscodeError::Timeout { .. }) => 504,
            Error::Transcode(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::UnsupportedDomain { .. } => "unsupported_domain",
            Error::InvalidFormat { .. } => "invalid_format",
            Error::Fetch(e) => match e {
                FetchError::BinaryMissing => "fetch_unavailable",
                FetchError::Spawn(_) => "fetch_failed",
                FetchError::Failed { .. } => "fetch_failed",
                FetchError::InvalidMetadata(_) => "fetch_invalid_metadata",
                FetchError::MissingOutput => "fetch_failed",
                FetchError::Timeout { .. } => "fetch_timeout",
            },
            Error::Transcode(e) => match e {
                TranscodeError::BinaryMissing => "transcode_unavailable",
                TranscodeError::Spawn(_) => "transcode_failed",
                TranscodeError::Failed { .. } => "transcode_failed",
                TranscodeError::MissingOutput => "transcode_failed",
                TranscodeError::Timeout { .. } => "transcode_timeout",
            },
            Error::FileTooLarge { .. } => "file_too_large",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::UnsupportedDomain { domain } => Some(serde_json::json!({
                "domain": domain,
            })),
            Error::InvalidFormat { format } => Some(serde_json::json!({
                "format": format,
                "supported": ["mp3", "mp4"],
            })),
            Error::FileTooLarge {
                size_bytes,
                limit_bytes,
            } => Some(serde_json::json!({
                "size_bytes": size_bytes,
                "limit_bytes": limit_bytes,
            })),
            Error::InvalidTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
