// Operator-mutable orchestration settings, persisted in the settings table

use serde::{Deserialize, Serialize};

pub const DEFAULT_POOL_START: u16 = 20000;
pub const DEFAULT_POOL_END: u16 = 30000;

/// Typed view of the settings key/value rows. Absent keys fall back to the
/// defaults here, so a partially populated table is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSettings {
    pub port_pool_start: u16,
    pub port_pool_end: u16,
    pub auto_upnp_enabled: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            port_pool_start: DEFAULT_POOL_START,
            port_pool_end: DEFAULT_POOL_END,
            auto_upnp_enabled: true,
        }
    }
}

impl OrchestratorSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.port_pool_start > 0,
            "portPoolStart must be > 0, got {}",
            self.port_pool_start
        );
        anyhow::ensure!(
            self.port_pool_start <= self.port_pool_end,
            "portPoolStart {} must not exceed portPoolEnd {}",
            self.port_pool_start,
            self.port_pool_end
        );
        Ok(())
    }
}
