//! REST API server module
//!
//! Provides the HTTP surface over [`VideoConverter`]: metadata probes,
//! conversion starts, progress streaming, direct downloads, and the service
//! status endpoint, with an OpenAPI spec generated at compile time.

use crate::{Config, Result, VideoConverter};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `GET /api/status` - Service status and disclaimer
/// - `POST /api/fetch` - Probe a URL for metadata
/// - `POST /api/convert` - Start a background conversion
/// - `GET /api/progress/:task_id` - Server-sent progress stream
/// - `GET /api/download` - Synchronous fetch-and-stream
/// - `GET /api/openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(converter: Arc<VideoConverter>, config: Arc<Config>) -> Router {
    let state = AppState::new(converter, config.clone());

    let router = Router::new()
        .route("/api/status", get(routes::service_status))
        .route("/api/fetch", post(routes::fetch_metadata))
        .route("/api/convert", post(routes::start_conversion))
        .route("/api/progress/:task_id", get(routes::progress_stream))
        .route("/api/download", get(routes::direct_download))
        .route("/api/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state).
    // SwaggerUi registers its own spec route, so it gets a path distinct
    // from the /api/openapi.json handler above.
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; otherwise only the listed origins are
/// allowed. Methods and headers are unrestricted either way.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Binds a TCP listener and serves the router until the server stops.
///
/// # Example
///
/// ```no_run
/// use vidxpress::{Config, VideoConverter};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let converter = VideoConverter::new((*config).clone()).await?;
///
/// // Start API server (blocks until shutdown)
/// vidxpress::api::start_api_server(converter, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(converter: Arc<VideoConverter>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "starting API server");

    let app = create_router(converter, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
