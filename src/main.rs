use anyhow::Result;
use gamewarden::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let registry = Arc::new(registry_repo::RegistryRepo::connect(&app_config.database.path).await?);
    registry.init().await?;

    let docker_repo = Arc::new(docker_repo::DockerRepo::connect()?);
    let runtime: Arc<dyn docker_repo::ContainerRuntime> = docker_repo.clone();

    let allocator = Arc::new(allocator::PortAllocator::new(registry.clone()));
    let exposure = Arc::new(exposure::ExposureManager::new(
        app_config.exposure.description_tag.clone(),
        app_config.exposure.lease_duration_secs,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let monitor_handle = monitor::spawn(
        monitor::MonitorDeps {
            registry: registry.clone(),
            runtime: runtime.clone(),
        },
        monitor::MonitorConfig {
            poll_interval_secs: app_config.monitoring.poll_interval_secs,
            cpu_alert_percent: app_config.monitoring.cpu_alert_percent,
            memory_alert_percent: app_config.monitoring.memory_alert_percent,
        },
        shutdown_rx,
    );

    let _maintenance_handle = maintenance::spawn(
        registry.clone(),
        maintenance::MaintenanceWorkerConfig {
            prune_schedule: app_config.maintenance.prune_schedule.clone(),
            prune_interval_secs: app_config.maintenance.prune_interval_secs,
            notification_retention_days: app_config.maintenance.notification_retention_days,
        },
    );

    let app = routes::app(registry, runtime, allocator, exposure);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    tokio::signal::ctrl_c().await
                }
            } => {
                tracing::info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
                let _ = monitor_handle.await;
            }
        }
    }

    Ok(())
}
