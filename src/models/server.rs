// Server registry models

use serde::{Deserialize, Serialize};

/// Persisted lifecycle state; serializes to lowercase JSON (e.g. "running").
/// The health monitor owns the transition into `Stopped` on crash; start/stop
/// transitions belong to the external lifecycle layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Stopped,
    Running,
    Crashed,
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Running => "running",
            ServerStatus::Crashed => "crashed",
            ServerStatus::Unknown => "unknown",
        }
    }

    /// Parse from a stored status string; anything unrecognized is Unknown.
    pub fn from_db(s: &str) -> Self {
        match s {
            "stopped" => ServerStatus::Stopped,
            "running" => ServerStatus::Running,
            "crashed" => ServerStatus::Crashed,
            _ => ServerStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub port: u16,
    pub status: ServerStatus,
    pub container_id: Option<String>,
}
