//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the vidxpress REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the vidxpress REST API
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidxpress REST API",
        version = "0.1.0",
        description = "REST API for fetching videos from supported platforms and converting them to MP3 or MP4",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Videos
        crate::api::routes::fetch_metadata,
        crate::api::routes::start_conversion,
        crate::api::routes::progress_stream,
        crate::api::routes::direct_download,

        // System
        crate::api::routes::service_status,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskSnapshot,
        crate::types::OutputFormat,
        crate::types::VideoQuality,
        crate::types::VideoMetadata,
        crate::types::FormatCatalog,

        // API request/response types
        crate::api::routes::FetchRequest,
        crate::api::routes::ConvertRequest,
        crate::api::routes::ConvertResponse,
        crate::api::routes::StatusResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "videos", description = "Video operations - Probe metadata, start conversions, stream progress, download media"),
        (name = "system", description = "System endpoints - Service status and OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_doc_generates() {
        let _spec = ApiDoc::openapi();
    }

    #[test]
    fn openapi_spec_has_paths() {
        let spec = ApiDoc::openapi();
        assert!(
            !spec.paths.paths.is_empty(),
            "OpenAPI spec should have paths defined"
        );
        assert!(spec.paths.paths.contains_key("/api/convert"));
        assert!(spec.paths.paths.contains_key("/api/progress/{task_id}"));
    }

    #[test]
    fn openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("spec should have components");
        assert!(
            !components.schemas.is_empty(),
            "OpenAPI spec should have schemas defined"
        );
        assert!(components.schemas.contains_key("TaskSnapshot"));
    }

    #[test]
    fn openapi_spec_has_tags() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.expect("spec should have tags");
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert!(tag_names.contains(&"videos"));
        assert!(tag_names.contains(&"system"));
    }

    #[test]
    fn openapi_json_serialization() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).expect("should serialize to JSON");
        assert!(!json.is_empty());
        let _value: serde_json::Value =
            serde_json::from_str(&json).expect("generated JSON should be valid");
    }
}
