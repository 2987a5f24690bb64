// SQLite registry: servers, notifications, and operator settings.

mod notifications;

use crate::models::{OrchestratorSettings, ServerRecord, ServerStatus};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const KEY_POOL_START: &str = "port_pool_start";
const KEY_POOL_END: &str = "port_pool_end";
const KEY_AUTO_UPNP: &str = "auto_upnp_enabled";

/// Milliseconds since epoch. The registry's timestamp currency.
pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "epoch_ms", "system time error");
            0
        })
}

pub struct RegistryRepo {
    pool: SqlitePool,
}

impl RegistryRepo {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                port INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'stopped',
                container_id TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Serves the (user, title, trailing-window) dedup lookup
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_dedup ON notifications(user_id, title, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn create_server(
        &self,
        user_id: i64,
        name: &str,
        port: u16,
    ) -> anyhow::Result<ServerRecord> {
        let row = sqlx::query(
            "INSERT INTO servers (user_id, name, port, status) VALUES ($1, $2, $3, 'stopped') RETURNING id",
        )
        .bind(user_id)
        .bind(name)
        .bind(port as i64)
        .fetch_one(&self.pool)
        .await?;
        let id: i64 = row.try_get("id")?;
        Ok(ServerRecord {
            id,
            user_id,
            name: name.to_string(),
            port,
            status: ServerStatus::Stopped,
            container_id: None,
        })
    }

    pub async fn get_server(&self, id: i64) -> anyhow::Result<Option<ServerRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, port, status, container_id FROM servers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::parse_server_row(&r)).transpose()
    }

    pub async fn list_servers(&self) -> anyhow::Result<Vec<ServerRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, port, status, container_id FROM servers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_server_row).collect()
    }

    /// Servers the health monitor polls: a container reference is set and the
    /// persisted status is not stopped. Bounds tick work to the active fleet.
    pub async fn active_servers(&self) -> anyhow::Result<Vec<ServerRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, port, status, container_id FROM servers
             WHERE container_id IS NOT NULL AND status != 'stopped' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_server_row).collect()
    }

    #[instrument(skip(self), fields(repo = "registry", operation = "update_server_status"))]
    pub async fn update_server_status(
        &self,
        id: i64,
        status: ServerStatus,
        container_id: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE servers SET status = $1, container_id = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(container_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ports recorded against any server row, in one bulk read. Callers pair
    /// this with an OS bind probe; the registry alone cannot see foreign
    /// processes squatting on a port.
    pub async fn ports_in_use(&self) -> anyhow::Result<HashSet<u16>> {
        let rows = sqlx::query("SELECT port FROM servers")
            .fetch_all(&self.pool)
            .await?;
        let mut out = HashSet::with_capacity(rows.len());
        for row in rows {
            let port: i64 = row.try_get("port")?;
            out.insert(port as u16);
        }
        Ok(out)
    }

    pub async fn load_settings(&self) -> anyhow::Result<OrchestratorSettings> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;
        let mut settings = OrchestratorSettings::default();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                KEY_POOL_START => {
                    if let Ok(v) = value.parse() {
                        settings.port_pool_start = v;
                    }
                }
                KEY_POOL_END => {
                    if let Ok(v) = value.parse() {
                        settings.port_pool_end = v;
                    }
                }
                KEY_AUTO_UPNP => settings.auto_upnp_enabled = value == "true",
                _ => {}
            }
        }
        Ok(settings)
    }

    pub async fn save_settings(&self, settings: &OrchestratorSettings) -> anyhow::Result<()> {
        settings.validate()?;
        let mut tx = self.pool.begin().await?;
        for (key, value) in [
            (KEY_POOL_START, settings.port_pool_start.to_string()),
            (KEY_POOL_END, settings.port_pool_end.to_string()),
            (KEY_AUTO_UPNP, settings.auto_upnp_enabled.to_string()),
        ] {
            sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ($1, $2)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn parse_server_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<ServerRecord> {
        let status: String = row.try_get("status")?;
        let port: i64 = row.try_get("port")?;
        Ok(ServerRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            port: port as u16,
            status: ServerStatus::from_db(&status),
            container_id: row.try_get("container_id")?,
        })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
