// Container runtime models

use serde::{Deserialize, Serialize};

/// Container state as reported by the runtime; serializes to lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Exited,
    Paused,
    Restarting,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from a Docker API state string (e.g. "running", "exited").
    /// "dead" counts as exited: the process is gone either way.
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "running" => ContainerState::Running,
            "exited" | "dead" => ContainerState::Exited,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            _ => ContainerState::Unknown,
        }
    }
}

/// One-shot resource sample for a running container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatsSample {
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
}

/// Identity row from a container listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerBrief {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
}
