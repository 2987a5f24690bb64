// Admin API tests over an in-process test server

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use gamewarden::allocator::PortAllocator;
use gamewarden::docker_repo::ContainerRuntime;
use gamewarden::exposure::ExposureManager;
use gamewarden::models::{ContainerBrief, ContainerState, ContainerStatsSample, OrchestratorSettings, Severity};
use gamewarden::registry_repo::RegistryRepo;
use serde_json::json;
use std::sync::Arc;

/// Runtime stub: alive but empty. Endpoints that inspect real containers are
/// covered by the monitor tests against FakeRuntime.
struct StubRuntime;

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn container_state(&self, id: &str) -> anyhow::Result<ContainerState> {
        anyhow::bail!("no such container: {id}")
    }

    async fn container_stats(&self, id: &str) -> anyhow::Result<ContainerStatsSample> {
        anyhow::bail!("no such container: {id}")
    }

    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerBrief>> {
        Ok(vec![])
    }
}

async fn test_server() -> (tempfile::TempDir, Arc<RegistryRepo>, TestServer) {
    let (dir, registry) = common::temp_registry().await;
    let allocator = Arc::new(PortAllocator::new(registry.clone()));
    let exposure = Arc::new(ExposureManager::new("GameWarden", 0));
    let app = gamewarden::routes::app(
        registry.clone(),
        Arc::new(StubRuntime),
        allocator,
        exposure,
    );
    let server = TestServer::try_new(app).expect("test server");
    (dir, registry, server)
}

#[tokio::test]
async fn version_reports_package_identity() {
    let (_dir, _registry, server) = test_server().await;
    let response = server.get("/version").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "gamewarden");
}

#[tokio::test]
async fn healthz_is_plain_ok() {
    let (_dir, _registry, server) = test_server().await;
    let response = server.get("/healthz").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn settings_roundtrip_over_http() {
    let (_dir, _registry, server) = test_server().await;

    let response = server.get("/api/settings").await;
    let body: OrchestratorSettings = response.json();
    assert_eq!(body, OrchestratorSettings::default());

    let updated = json!({
        "portPoolStart": 22000,
        "portPoolEnd": 22100,
        "autoUpnpEnabled": false
    });
    let response = server.put("/api/settings").json(&updated).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: OrchestratorSettings = server.get("/api/settings").await.json();
    assert_eq!(body.port_pool_start, 22000);
    assert!(!body.auto_upnp_enabled);
}

#[tokio::test]
async fn settings_put_rejects_inverted_pool() {
    let (_dir, _registry, server) = test_server().await;
    let bad = json!({
        "portPoolStart": 30000,
        "portPoolEnd": 20000,
        "autoUpnpEnabled": true
    });
    let response = server.put("/api/settings").json(&bad).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn allocate_scans_the_configured_pool() {
    let (_dir, registry, server) = test_server().await;
    registry
        .save_settings(&OrchestratorSettings {
            port_pool_start: 23500,
            port_pool_end: 23510,
            auto_upnp_enabled: true,
        })
        .await
        .unwrap();

    let response = server
        .post("/api/ports/allocate")
        .json(&json!({ "protocol": "both" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["port"], 23500);
}

#[tokio::test]
async fn allocate_falls_back_when_preferred_is_taken() {
    let (_dir, registry, server) = test_server().await;
    registry
        .save_settings(&OrchestratorSettings {
            port_pool_start: 23520,
            port_pool_end: 23530,
            auto_upnp_enabled: true,
        })
        .await
        .unwrap();
    registry.create_server(1, "a", 23525).await.unwrap();

    let response = server
        .post("/api/ports/allocate")
        .json(&json!({ "preferred": 23525, "protocol": "tcp" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["port"], 23520);

    let response = server
        .post("/api/ports/allocate")
        .json(&json!({ "preferred": 23525, "protocol": "tcp", "fallback": false }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn exposure_open_respects_upnp_toggle() {
    let (_dir, registry, server) = test_server().await;
    registry
        .save_settings(&OrchestratorSettings {
            auto_upnp_enabled: false,
            ..OrchestratorSettings::default()
        })
        .await
        .unwrap();

    let response = server
        .post("/api/exposure/open")
        .json(&json!({ "port": 27015, "protocol": "udp" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn notifications_listing_and_read_flow() {
    let (_dir, registry, server) = test_server().await;
    registry
        .create_notification_if_absent(
            7,
            Severity::Error,
            "Server Crashed: cs2-main",
            "cs2-main exited unexpectedly.",
            1_700_000_000_000,
            0,
        )
        .await
        .unwrap();

    let response = server.get("/api/notifications/7").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    let list = body["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Server Crashed: cs2-main");
    assert_eq!(list[0]["read"], false);

    let id = list[0]["id"].as_i64().unwrap();
    let response = server.post(&format!("/api/notifications/{id}/read")).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = server.post("/api/notifications/99999/read").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rcon_endpoint_maps_transport_failure_to_bad_gateway() {
    let (_dir, _registry, server) = test_server().await;
    // Bind-then-drop to find a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = server
        .post("/api/rcon")
        .json(&json!({
            "host": addr.ip().to_string(),
            "port": addr.port(),
            "password": "pw",
            "command": "status"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn status_reports_runtime_liveness() {
    let (_dir, _registry, server) = test_server().await;
    let response = server.get("/api/status").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["docker"], true);
    assert_eq!(body["containers"], 0);
    // upnp depends on whether a live gateway answers; only its presence is
    // asserted here
    assert!(body["upnp"].is_boolean());
}
