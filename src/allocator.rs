// Port allocation: one bulk registry read plus an OS-level bind probe per
// candidate. The registry alone cannot see foreign processes on a port, and
// the OS alone cannot see ports promised to stopped servers.

use crate::models::{Protocol, Transport};
use crate::registry_repo::RegistryRepo;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, UdpSocket};
use tracing::debug;

#[derive(Debug, Error)]
pub enum AllocError {
    /// The preferred port is taken; callers fall back to a pool scan.
    #[error("port {0} is already in use")]
    PortUnavailable(u16),
    /// Pool exhausted; fatal to the enclosing create-server operation.
    #[error("no free ports in pool {start}-{end}")]
    NoPortsAvailable { start: u16, end: u16 },
    #[error(transparent)]
    Registry(#[from] anyhow::Error),
}

pub struct PortAllocator {
    registry: Arc<RegistryRepo>,
}

impl PortAllocator {
    pub fn new(registry: Arc<RegistryRepo>) -> Self {
        Self { registry }
    }

    /// With a preferred port: accept it iff it is absent from the registry's
    /// in-use set and a bind probe succeeds; otherwise PortUnavailable.
    /// Without one: scan the configured pool ascending and return the first
    /// candidate that passes both checks. The scan is sequential so at most
    /// one transient listener is open at a time.
    pub async fn allocate(
        &self,
        preferred: Option<u16>,
        protocol: Protocol,
    ) -> Result<u16, AllocError> {
        let in_use = self.registry.ports_in_use().await?;

        if let Some(port) = preferred {
            if !in_use.contains(&port) && bind_probe(port, protocol).await {
                return Ok(port);
            }
            return Err(AllocError::PortUnavailable(port));
        }

        let settings = self.registry.load_settings().await?;
        let (start, end) = (settings.port_pool_start, settings.port_pool_end);
        for port in start..=end {
            if in_use.contains(&port) {
                continue;
            }
            if bind_probe(port, protocol).await {
                debug!(port, "allocated from pool");
                return Ok(port);
            }
        }
        Err(AllocError::NoPortsAvailable { start, end })
    }
}

/// Bind-and-release test: the port is only considered free if a transient
/// listener can actually be opened on it. For `Both`, the TCP and UDP probes
/// must each succeed. The listener is dropped immediately.
pub async fn bind_probe(port: u16, protocol: Protocol) -> bool {
    for transport in protocol.transports() {
        let ok = match transport {
            Transport::Tcp => TcpListener::bind(("0.0.0.0", port)).await.is_ok(),
            Transport::Udp => UdpSocket::bind(("0.0.0.0", port)).await.is_ok(),
        };
        if !ok {
            return false;
        }
    }
    true
}
