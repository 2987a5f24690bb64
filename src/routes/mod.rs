// Admin HTTP API: the orchestration operations consumed by the external UI.

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::allocator::PortAllocator;
use crate::docker_repo::ContainerRuntime;
use crate::exposure::ExposureManager;
use crate::registry_repo::RegistryRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<RegistryRepo>,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
    pub(crate) allocator: Arc<PortAllocator>,
    pub(crate) exposure: Arc<ExposureManager>,
}

pub fn app(
    registry: Arc<RegistryRepo>,
    runtime: Arc<dyn ContainerRuntime>,
    allocator: Arc<PortAllocator>,
    exposure: Arc<ExposureManager>,
) -> Router {
    let state = AppState {
        registry,
        runtime,
        allocator,
        exposure,
    };
    Router::new()
        .route("/", get(|| async { "gamewarden orchestration API" }))
        .route("/version", get(http::version_handler))
        .route("/healthz", get(http::healthz_handler))
        .route("/api/status", get(http::status_handler))
        .route("/api/ports/allocate", post(http::allocate_handler))
        .route("/api/exposure/open", post(http::exposure_open_handler))
        .route("/api/exposure/close", post(http::exposure_close_handler))
        .route("/api/exposure/mappings", get(http::exposure_mappings_handler))
        .route("/api/exposure/ports/{port}", get(http::exposure_port_handler))
        .route("/api/rcon", post(http::rcon_handler))
        .route("/api/notifications/{user_id}", get(http::notifications_handler))
        .route(
            "/api/notifications/{id}/read",
            post(http::notification_read_handler),
        )
        .route(
            "/api/settings",
            get(http::settings_get_handler).put(http::settings_put_handler),
        )
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
