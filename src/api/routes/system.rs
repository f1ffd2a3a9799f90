//! System handlers: service status and OpenAPI spec.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

/// Response body for the status endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Always "ok" while the service answers requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Conversions currently running
    pub active_tasks: usize,
    /// Task records held in memory, terminal ones included
    pub tracked_tasks: usize,
    /// Legal notice for consumers of the service
    pub disclaimer: String,
}

/// GET /api/status - Service status and disclaimer
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "system",
    responses(
        (status = 200, description = "Service is online", body = StatusResponse)
    )
)]
pub async fn service_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_tasks: state.converter.active_task_count().await,
        tracked_tasks: state.converter.task_count().await,
        disclaimer: state.config.api.disclaimer.clone(),
    })
}

/// GET /api/openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
