use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Seconds between health ticks over the active fleet.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_alert_percent")]
    pub cpu_alert_percent: f64,
    #[serde(default = "default_alert_percent")]
    pub memory_alert_percent: f64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_alert_percent() -> f64 {
    90.0
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            cpu_alert_percent: default_alert_percent(),
            memory_alert_percent: default_alert_percent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExposureConfig {
    /// Mapping lease in seconds; 0 requests an indefinite lease.
    #[serde(default)]
    pub lease_duration_secs: u32,
    /// Application identifier embedded in mapping descriptions and firewall
    /// rule names, so entries on the router are attributable.
    #[serde(default = "default_description_tag")]
    pub description_tag: String,
}

fn default_description_tag() -> String {
    "GameWarden".to_string()
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            lease_duration_secs: 0,
            description_tag: default_description_tag(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Optional cron expression for notification pruning (e.g. "0 0 4 * * * *"
    /// = 04:00 daily). Uses local time.
    #[serde(default)]
    pub prune_schedule: Option<String>,
    /// Run pruning every N seconds when prune_schedule is not set.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Read notifications older than this many days are deleted.
    #[serde(default = "default_notification_retention_days")]
    pub notification_retention_days: u32,
}

fn default_prune_interval_secs() -> u64 {
    86_400
}

fn default_notification_retention_days() -> u32 {
    30
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            prune_schedule: None,
            prune_interval_secs: default_prune_interval_secs(),
            notification_retention_days: default_notification_retention_days(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.poll_interval_secs > 0,
            "monitoring.poll_interval_secs must be > 0, got {}",
            self.monitoring.poll_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.cpu_alert_percent > 0.0 && self.monitoring.cpu_alert_percent <= 100.0,
            "monitoring.cpu_alert_percent must be in (0, 100], got {}",
            self.monitoring.cpu_alert_percent
        );
        anyhow::ensure!(
            self.monitoring.memory_alert_percent > 0.0
                && self.monitoring.memory_alert_percent <= 100.0,
            "monitoring.memory_alert_percent must be in (0, 100], got {}",
            self.monitoring.memory_alert_percent
        );
        anyhow::ensure!(
            !self.exposure.description_tag.is_empty(),
            "exposure.description_tag must be non-empty"
        );
        anyhow::ensure!(
            self.maintenance.prune_interval_secs > 0,
            "maintenance.prune_interval_secs must be > 0, got {}",
            self.maintenance.prune_interval_secs
        );
        anyhow::ensure!(
            self.maintenance.notification_retention_days > 0,
            "maintenance.notification_retention_days must be > 0, got {}",
            self.maintenance.notification_retention_days
        );
        Ok(())
    }
}
