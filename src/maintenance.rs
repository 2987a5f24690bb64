// Scheduled notification pruning (cron expression or fixed interval).

use crate::registry_repo::{RegistryRepo, epoch_ms};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct MaintenanceWorkerConfig {
    /// Optional cron expression (e.g. "0 0 4 * * * *" = 04:00 daily). Uses
    /// local time.
    pub prune_schedule: Option<String>,
    /// Run pruning every N seconds when prune_schedule is not set.
    pub prune_interval_secs: u64,
    pub notification_retention_days: u32,
}

/// Spawns the maintenance worker. Returns a join handle.
pub fn spawn(
    registry: Arc<RegistryRepo>,
    config: MaintenanceWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(registry, config).await;
    })
}

async fn run(registry: Arc<RegistryRepo>, config: MaintenanceWorkerConfig) {
    let (prune_tx, mut prune_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(prune_scheduler(config.clone(), prune_tx));

    while prune_rx.recv().await.is_some() {
        let cutoff = epoch_ms() - (config.notification_retention_days as i64) * MS_PER_DAY;
        match registry.prune_read_notifications(cutoff).await {
            Ok(removed) if removed > 0 => {
                info!(removed, "pruned read notifications");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "notification pruning failed"),
        }
    }
}

/// Sends on `tx` at each prune time (cron or fixed interval). Local time for
/// cron.
async fn prune_scheduler(config: MaintenanceWorkerConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.prune_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid prune_schedule; pruning will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.prune_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}
