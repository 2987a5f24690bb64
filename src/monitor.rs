// Health monitor: once per tick, reconcile each active server's persisted
// state against the container runtime and raise deduplicated notifications.

use crate::docker_repo::ContainerRuntime;
use crate::models::{AlertKind, ContainerState, ServerRecord, ServerStatus};
use crate::registry_repo::{RegistryRepo, epoch_ms};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{debug, warn};

/// Trailing window in which a repeated (user, title) notification is
/// suppressed.
pub const DEDUP_WINDOW_MS: i64 = 5 * 60 * 1000;

pub struct MonitorDeps {
    pub registry: Arc<RegistryRepo>,
    pub runtime: Arc<dyn ContainerRuntime>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub cpu_alert_percent: f64,
    pub memory_alert_percent: f64,
}

/// Spawns the recurring monitor task. The returned handle completes after a
/// shutdown signal; ticks that overrun the interval are skipped, not queued.
pub fn spawn(
    deps: MonitorDeps,
    config: MonitorConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(config.poll_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    poll_once(&deps, &config).await;
                }
                _ = &mut shutdown_rx => {
                    debug!("health monitor shutting down");
                    break;
                }
            }
        }
    })
}

/// One full pass over the active fleet. Servers are checked sequentially:
/// this bounds concurrent load on the runtime API and keeps the dedup
/// check-and-create step race-free without locking. A single server's failure
/// never stops the tick from covering the rest.
pub async fn poll_once(deps: &MonitorDeps, config: &MonitorConfig) {
    let servers = match deps.registry.active_servers().await {
        Ok(servers) => servers,
        Err(e) => {
            warn!(error = %e, operation = "active_servers", "health tick skipped");
            return;
        }
    };
    for server in &servers {
        if let Err(e) = check_server(deps, config, server).await {
            warn!(
                error = %e,
                server_id = server.id,
                server = %server.name,
                "health check failed"
            );
        }
    }
}

async fn check_server(
    deps: &MonitorDeps,
    config: &MonitorConfig,
    server: &ServerRecord,
) -> anyhow::Result<()> {
    let Some(container_id) = server.container_id.as_deref() else {
        return Ok(());
    };
    let now_ms = epoch_ms();

    match deps.runtime.container_state(container_id).await? {
        ContainerState::Exited => {
            // Registry says it should be running but the process is gone:
            // that is a crash. Persist stopped and drop the container ref so
            // the next tick excludes this server.
            if server.status != ServerStatus::Stopped {
                let kind = AlertKind::Crash;
                let created = deps
                    .registry
                    .create_notification_if_absent(
                        server.user_id,
                        kind.severity(),
                        &kind.title(&server.name),
                        &format!(
                            "{} exited unexpectedly and has been marked as stopped.",
                            server.name
                        ),
                        now_ms,
                        DEDUP_WINDOW_MS,
                    )
                    .await?;
                deps.registry
                    .update_server_status(server.id, ServerStatus::Stopped, None)
                    .await?;
                if created {
                    warn!(server = %server.name, server_id = server.id, "server crash detected");
                }
            }
        }
        ContainerState::Running => {
            let stats = deps.runtime.container_stats(container_id).await?;
            // Both thresholds may fire independently in the same tick.
            if stats.cpu_percent > config.cpu_alert_percent {
                let kind = AlertKind::HighCpu;
                deps.registry
                    .create_notification_if_absent(
                        server.user_id,
                        kind.severity(),
                        &kind.title(&server.name),
                        &format!(
                            "{} is using {:.1}% CPU (threshold {:.0}%).",
                            server.name, stats.cpu_percent, config.cpu_alert_percent
                        ),
                        now_ms,
                        DEDUP_WINDOW_MS,
                    )
                    .await?;
            }
            if stats.memory_percent > config.memory_alert_percent {
                let kind = AlertKind::HighMemory;
                deps.registry
                    .create_notification_if_absent(
                        server.user_id,
                        kind.severity(),
                        &kind.title(&server.name),
                        &format!(
                            "{} is using {:.1}% of its memory limit (threshold {:.0}%).",
                            server.name, stats.memory_percent, config.memory_alert_percent
                        ),
                        now_ms,
                        DEDUP_WINDOW_MS,
                    )
                    .await?;
            }
        }
        // Paused/restarting/unknown pass through unmodified.
        _ => {}
    }
    Ok(())
}
