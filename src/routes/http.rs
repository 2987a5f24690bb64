// JSON handlers for the orchestration operations

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::allocator::AllocError;
use crate::models::{OrchestratorSettings, Protocol};
use crate::rcon::{self, RconError};
use crate::version::{NAME, VERSION};

type ApiError = (StatusCode, axum::Json<serde_json::Value>);

fn error_response(status: StatusCode, err: impl std::fmt::Display) -> ApiError {
    (status, axum::Json(json!({ "error": err.to_string() })))
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
}

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /healthz — process liveness only; no downstream checks.
pub(super) async fn healthz_handler() -> impl IntoResponse {
    "ok"
}

/// GET /api/status — Docker liveness and UPnP usability in one report.
pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let docker = state.runtime.ping().await.is_ok();
    let containers = if docker {
        state
            .runtime
            .list_containers()
            .await
            .map(|c| c.len())
            .unwrap_or(0)
    } else {
        0
    };
    let upnp = state.exposure.check_status().await;
    axum::Json(json!({
        "docker": docker,
        "containers": containers,
        "upnp": upnp,
    }))
}

fn default_protocol() -> Protocol {
    Protocol::Both
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AllocateRequest {
    preferred: Option<u16>,
    #[serde(default = "default_protocol")]
    protocol: Protocol,
    /// Fall back to a pool scan when the preferred port is taken.
    #[serde(default = "default_true")]
    fallback: bool,
}

/// POST /api/ports/allocate
pub(super) async fn allocate_handler(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<AllocateRequest>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let result = match state.allocator.allocate(req.preferred, req.protocol).await {
        Err(AllocError::PortUnavailable(_)) if req.fallback => {
            state.allocator.allocate(None, req.protocol).await
        }
        other => other,
    };
    match result {
        Ok(port) => Ok(axum::Json(json!({ "port": port }))),
        Err(e @ AllocError::PortUnavailable(_)) => Err(error_response(StatusCode::CONFLICT, e)),
        Err(e @ AllocError::NoPortsAvailable { .. }) => {
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e))
        }
        Err(e) => Err(internal(e)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ExposureRequest {
    port: u16,
    #[serde(default = "default_protocol")]
    protocol: Protocol,
}

/// POST /api/exposure/open
pub(super) async fn exposure_open_handler(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<ExposureRequest>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let settings = state.registry.load_settings().await.map_err(internal)?;
    if !settings.auto_upnp_enabled {
        return Err(error_response(
            StatusCode::CONFLICT,
            "UPnP automation is disabled in settings",
        ));
    }
    state
        .exposure
        .open(req.port, req.protocol)
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, e))?;
    Ok(axum::Json(json!({ "port": req.port, "open": true })))
}

/// POST /api/exposure/close
pub(super) async fn exposure_close_handler(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<ExposureRequest>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    state
        .exposure
        .close(req.port, req.protocol)
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, e))?;
    Ok(axum::Json(json!({ "port": req.port, "open": false })))
}

/// GET /api/exposure/mappings
pub(super) async fn exposure_mappings_handler(
    State(state): State<AppState>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let mappings = state
        .exposure
        .list_mappings()
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, e))?;
    Ok(axum::Json(json!({ "mappings": mappings })))
}

/// GET /api/exposure/ports/{port} — advisory reachability hint.
pub(super) async fn exposure_port_handler(
    State(state): State<AppState>,
    Path(port): Path<u16>,
) -> impl IntoResponse {
    let open = state.exposure.is_open(port).await;
    axum::Json(json!({ "port": port, "open": open }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RconRequest {
    host: String,
    port: u16,
    password: String,
    command: String,
}

/// POST /api/rcon — one blocking round trip against a game server.
pub(super) async fn rcon_handler(
    axum::Json(req): axum::Json<RconRequest>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    match rcon::execute(&req.host, req.port, &req.password, &req.command).await {
        Ok(response) => Ok(axum::Json(json!({ "response": response }))),
        Err(e @ RconError::AuthFailed) => Err(error_response(StatusCode::UNAUTHORIZED, e)),
        Err(e @ RconError::Timeout) => Err(error_response(StatusCode::GATEWAY_TIMEOUT, e)),
        Err(e) => Err(error_response(StatusCode::BAD_GATEWAY, e)),
    }
}

fn default_notification_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub(super) struct NotificationsQuery {
    #[serde(default = "default_notification_limit")]
    limit: u32,
}

/// GET /api/notifications/{user_id}
pub(super) async fn notifications_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<NotificationsQuery>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let notifications = state
        .registry
        .notifications_for_user(user_id, query.limit)
        .await
        .map_err(internal)?;
    Ok(axum::Json(json!({ "notifications": notifications })))
}

/// POST /api/notifications/{id}/read
pub(super) async fn notification_read_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<axum::Json<serde_json::Value>, ApiError> {
    let updated = state
        .registry
        .mark_notification_read(id)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("notification {id} not found"),
        ));
    }
    Ok(axum::Json(json!({ "id": id, "read": true })))
}

/// GET /api/settings
pub(super) async fn settings_get_handler(
    State(state): State<AppState>,
) -> Result<axum::Json<OrchestratorSettings>, ApiError> {
    let settings = state.registry.load_settings().await.map_err(internal)?;
    Ok(axum::Json(settings))
}

/// PUT /api/settings
pub(super) async fn settings_put_handler(
    State(state): State<AppState>,
    axum::Json(settings): axum::Json<OrchestratorSettings>,
) -> Result<axum::Json<OrchestratorSettings>, ApiError> {
    state
        .registry
        .save_settings(&settings)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
    Ok(axum::Json(settings))
}
