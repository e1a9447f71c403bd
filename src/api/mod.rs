//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Channel endpoints are mounted under `/api/v1`; `/health` and
//! `/openapi.json` sit at the root.

pub mod dto;
pub mod handlers;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the console API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "stream-control console",
        description = "Inspect control channels and submit commands to live-stream control servers."
    ),
    paths(
        handlers::system::health_handler,
        handlers::channels::list_channels,
        handlers::channels::get_channel,
        handlers::channels::submit_command,
    ),
    components(schemas(
        crate::domain::ChannelSnapshot,
        crate::domain::ChannelSummary,
        crate::domain::ConnectionState,
        crate::domain::ChannelRole,
        crate::domain::Endpoint,
        crate::domain::LogEntry,
        crate::domain::LogLevel,
        crate::domain::PendingAction,
        crate::channel::SendOutcome,
        dto::SubmitCommandRequest,
        dto::SubmitCommandResponse,
        dto::ChannelListResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Channels", description = "Control channel inspection and commands"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// `GET /openapi.json`: The OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
