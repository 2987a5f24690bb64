// Notification queries, including the trailing-window dedup check.

use super::RegistryRepo;
use crate::models::{Notification, Severity};
use sqlx::Row;
use tracing::instrument;

impl RegistryRepo {
    /// Creates a notification unless one with the same (user_id, title) was
    /// created within the trailing `window_ms`. Returns true when a row was
    /// inserted. Callers serialize invocations per (user, title); there is no
    /// store-level uniqueness guard.
    #[instrument(skip(self, message), fields(repo = "registry", operation = "create_notification"))]
    pub async fn create_notification_if_absent(
        &self,
        user_id: i64,
        severity: Severity,
        title: &str,
        message: &str,
        now_ms: i64,
        window_ms: i64,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM notifications
             WHERE user_id = $1 AND title = $2 AND created_at > $3",
        )
        .bind(user_id)
        .bind(title)
        .bind(now_ms - window_ms)
        .fetch_one(self.pool())
        .await?;
        let n: i64 = row.try_get("n")?;
        if n > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO notifications (user_id, severity, title, message, created_at, read)
             VALUES ($1, $2, $3, $4, $5, 0)",
        )
        .bind(user_id)
        .bind(severity.as_str())
        .bind(title)
        .bind(message)
        .bind(now_ms)
        .execute(self.pool())
        .await?;
        Ok(true)
    }

    pub async fn notifications_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, user_id, severity, title, message, created_at, read
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let severity: String = row.try_get("severity")?;
            let read: i64 = row.try_get("read")?;
            out.push(Notification {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                severity: Severity::from_db(&severity),
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
                read: read != 0,
            });
        }
        Ok(out)
    }

    /// Returns false when the id does not exist.
    pub async fn mark_notification_read(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes read notifications created before `cutoff_ms`; unread ones are
    /// kept regardless of age. Returns the number of rows removed.
    #[instrument(skip(self), fields(repo = "registry", operation = "prune_notifications"))]
    pub async fn prune_read_notifications(&self, cutoff_ms: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE read = 1 AND created_at < $1")
            .bind(cutoff_ms)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
