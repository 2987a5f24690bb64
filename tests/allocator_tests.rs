// Port allocator tests: pool scan determinism, registry exclusion, bind probe

mod common;

use gamewarden::allocator::{AllocError, PortAllocator, bind_probe};
use gamewarden::models::{OrchestratorSettings, Protocol};

async fn narrow_pool(registry: &gamewarden::registry_repo::RegistryRepo, start: u16, end: u16) {
    registry
        .save_settings(&OrchestratorSettings {
            port_pool_start: start,
            port_pool_end: end,
            auto_upnp_enabled: true,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn pool_scan_returns_lowest_free_port() {
    let (_dir, registry) = common::temp_registry().await;
    narrow_pool(&registry, 21500, 21510).await;

    let allocator = PortAllocator::new(registry.clone());
    let port = allocator.allocate(None, Protocol::Both).await.unwrap();
    assert_eq!(port, 21500);
}

#[tokio::test]
async fn pool_scan_skips_registry_assigned_ports() {
    let (_dir, registry) = common::temp_registry().await;
    narrow_pool(&registry, 21520, 21530).await;
    registry.create_server(1, "a", 21520).await.unwrap();
    registry.create_server(1, "b", 21521).await.unwrap();

    let allocator = PortAllocator::new(registry.clone());
    let port = allocator.allocate(None, Protocol::Both).await.unwrap();
    assert_eq!(port, 21522);
}

#[tokio::test]
async fn pool_scan_skips_os_bound_ports() {
    let (_dir, registry) = common::temp_registry().await;
    narrow_pool(&registry, 21540, 21545).await;

    // Occupy the first candidate at the OS level; the registry knows nothing
    let _squatter = tokio::net::TcpListener::bind(("0.0.0.0", 21540))
        .await
        .unwrap();

    let allocator = PortAllocator::new(registry.clone());
    let port = allocator.allocate(None, Protocol::Both).await.unwrap();
    assert_eq!(port, 21541);
}

#[tokio::test]
async fn preferred_port_accepted_when_free() {
    let (_dir, registry) = common::temp_registry().await;
    let allocator = PortAllocator::new(registry.clone());
    let port = allocator
        .allocate(Some(21560), Protocol::Both)
        .await
        .unwrap();
    assert_eq!(port, 21560);
}

#[tokio::test]
async fn preferred_port_rejected_when_in_registry() {
    let (_dir, registry) = common::temp_registry().await;
    registry.create_server(1, "a", 21570).await.unwrap();

    let allocator = PortAllocator::new(registry.clone());
    let err = allocator
        .allocate(Some(21570), Protocol::Both)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocError::PortUnavailable(21570)));
}

#[tokio::test]
async fn preferred_port_rejected_when_os_bound() {
    let (_dir, registry) = common::temp_registry().await;
    let _squatter = tokio::net::TcpListener::bind(("0.0.0.0", 21580))
        .await
        .unwrap();

    let allocator = PortAllocator::new(registry.clone());
    let err = allocator
        .allocate(Some(21580), Protocol::Tcp)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocError::PortUnavailable(21580)));
}

#[tokio::test]
async fn exhausted_pool_is_a_hard_error() {
    let (_dir, registry) = common::temp_registry().await;
    narrow_pool(&registry, 21590, 21591).await;
    registry.create_server(1, "a", 21590).await.unwrap();
    registry.create_server(1, "b", 21591).await.unwrap();

    let allocator = PortAllocator::new(registry.clone());
    let err = allocator.allocate(None, Protocol::Both).await.unwrap_err();
    assert!(matches!(
        err,
        AllocError::NoPortsAvailable {
            start: 21590,
            end: 21591
        }
    ));
}

#[tokio::test]
async fn bind_probe_udp_only_ignores_tcp_listener() {
    // A TCP listener on the port does not block a UDP-only probe
    let _tcp = tokio::net::TcpListener::bind(("0.0.0.0", 21600))
        .await
        .unwrap();
    assert!(bind_probe(21600, Protocol::Udp).await);
    assert!(!bind_probe(21600, Protocol::Tcp).await);
    assert!(!bind_probe(21600, Protocol::Both).await);
}

#[tokio::test]
async fn bind_probe_releases_the_port() {
    assert!(bind_probe(21610, Protocol::Both).await);
    // The transient listener is gone; the port binds again immediately
    assert!(bind_probe(21610, Protocol::Both).await);
}
