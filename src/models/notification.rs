// Notification models and health alert kinds

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "warning" => Severity::Warning,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Milliseconds since epoch.
    pub created_at: i64,
    pub read: bool,
}

/// Anomaly kinds raised by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Crash,
    HighCpu,
    HighMemory,
}

impl AlertKind {
    /// Title for a given server. Deterministic per (server, kind) so repeats
    /// collide in the dedup window; measured values go in the message only.
    pub fn title(&self, server_name: &str) -> String {
        match self {
            AlertKind::Crash => format!("Server Crashed: {server_name}"),
            AlertKind::HighCpu => format!("High CPU Usage: {server_name}"),
            AlertKind::HighMemory => format!("High Memory Usage: {server_name}"),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::Crash => Severity::Error,
            AlertKind::HighCpu | AlertKind::HighMemory => Severity::Warning,
        }
    }
}
