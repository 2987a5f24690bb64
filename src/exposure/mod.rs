// Router port-mapping automation (UPnP IGD) with a host-firewall fallback.
// Every gateway exchange is bounded by GATEWAY_TIMEOUT so an unresponsive
// router cannot stall a caller.

pub mod firewall;

use crate::models::{PortMapping, Protocol, Transport};
use igd_next::aio::tokio::{Tokio, search_gateway};
use igd_next::{PortMappingProtocol, SearchOptions};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Hard ceiling on any single gateway exchange.
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(3);

/// Routers with huge NAT tables exist; stop scanning past this index.
const MAX_MAPPING_ENTRIES: u32 = 1000;

type Gateway = igd_next::aio::Gateway<Tokio>;

#[derive(Debug, Error)]
pub enum ExposureError {
    #[error("gateway did not respond within {}s", GATEWAY_TIMEOUT.as_secs())]
    GatewayTimeout,
    #[error("no UPnP gateway available: {0}")]
    GatewayUnavailable(String),
    #[error("port mapping rejected by gateway: {0}")]
    MappingFailed(String),
    #[error("could not determine LAN address: {0}")]
    LocalAddress(#[from] std::io::Error),
    #[error("firewall rule update failed: {0}")]
    FirewallFailed(String),
}

pub struct ExposureManager {
    description_tag: String,
    lease_duration_secs: u32,
}

impl ExposureManager {
    pub fn new(description_tag: impl Into<String>, lease_duration_secs: u32) -> Self {
        Self {
            description_tag: description_tag.into(),
            lease_duration_secs,
        }
    }

    async fn gateway(&self) -> Result<Gateway, ExposureError> {
        let options = SearchOptions {
            timeout: Some(GATEWAY_TIMEOUT),
            ..Default::default()
        };
        match timeout(GATEWAY_TIMEOUT, search_gateway(options)).await {
            Ok(Ok(gateway)) => Ok(gateway),
            Ok(Err(e)) => Err(ExposureError::GatewayUnavailable(e.to_string())),
            Err(_) => Err(ExposureError::GatewayTimeout),
        }
    }

    /// Maps `port` on the router for each transport in `protocol`. If the
    /// router path fails, a host firewall rule is applied instead as a
    /// best-effort fallback. A partial router mapping (TCP mapped, UDP
    /// refused) reports failure but is left in place: an extra forwarded port
    /// is a lower-severity failure mode than none.
    pub async fn open(&self, port: u16, protocol: Protocol) -> Result<(), ExposureError> {
        match self.open_via_gateway(port, protocol).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, port, "UPnP mapping failed; applying host firewall rule");
                firewall::allow_inbound(&self.description_tag, port, protocol).await
            }
        }
    }

    async fn open_via_gateway(&self, port: u16, protocol: Protocol) -> Result<(), ExposureError> {
        let gateway = self.gateway().await?;
        let local_ip = lan_address_for(gateway.addr)?;
        for transport in protocol.transports() {
            let description = format!(
                "{} Port {} {}",
                self.description_tag,
                port,
                transport.label()
            );
            let add = gateway.add_port(
                mapping_protocol(*transport),
                port,
                SocketAddr::new(local_ip, port),
                self.lease_duration_secs,
                &description,
            );
            match timeout(GATEWAY_TIMEOUT, add).await {
                Ok(Ok(())) => {
                    debug!(port, transport = transport.label(), "gateway mapping added");
                }
                Ok(Err(e)) => return Err(ExposureError::MappingFailed(e.to_string())),
                Err(_) => return Err(ExposureError::GatewayTimeout),
            }
        }
        Ok(())
    }

    /// Removes the router mapping for each transport, then the fallback
    /// firewall rule. Gateway failures are reported; firewall cleanup is
    /// best-effort.
    pub async fn close(&self, port: u16, protocol: Protocol) -> Result<(), ExposureError> {
        let mut first_error = None;
        match self.gateway().await {
            Ok(gateway) => {
                for transport in protocol.transports() {
                    let remove = gateway.remove_port(mapping_protocol(*transport), port);
                    match timeout(GATEWAY_TIMEOUT, remove).await {
                        Ok(Ok(())) => {
                            debug!(port, transport = transport.label(), "gateway mapping removed");
                        }
                        Ok(Err(e)) => {
                            first_error
                                .get_or_insert(ExposureError::MappingFailed(e.to_string()));
                        }
                        Err(_) => {
                            first_error.get_or_insert(ExposureError::GatewayTimeout);
                        }
                    }
                }
            }
            Err(e) => {
                first_error = Some(e);
            }
        }

        if let Err(e) = firewall::remove_rules(&self.description_tag, port, protocol).await {
            debug!(error = %e, port, "firewall rule removal failed");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Live view of the router's NAT table. Advisory: an empty list does not
    /// mean the port is unreachable (manual router config, non-NAT network).
    pub async fn list_mappings(&self) -> Result<Vec<PortMapping>, ExposureError> {
        let gateway = self.gateway().await?;
        match timeout(GATEWAY_TIMEOUT, collect_mappings(&gateway)).await {
            Ok(result) => result,
            Err(_) => Err(ExposureError::GatewayTimeout),
        }
    }

    /// Whether any mapping for `port` exists on the router. A status hint,
    /// never an enforcement check.
    pub async fn is_open(&self, port: u16) -> bool {
        match self.list_mappings().await {
            Ok(mappings) => mapping_exists(&mappings, port),
            Err(e) => {
                debug!(error = %e, port, "mapping list unavailable");
                false
            }
        }
    }

    pub async fn external_ip(&self) -> Result<IpAddr, ExposureError> {
        let gateway = self.gateway().await?;
        match timeout(GATEWAY_TIMEOUT, gateway.get_external_ip()).await {
            Ok(Ok(ip)) => Ok(ip),
            Ok(Err(e)) => Err(ExposureError::GatewayUnavailable(e.to_string())),
            Err(_) => Err(ExposureError::GatewayTimeout),
        }
    }

    /// True when the gateway answers an external-IP query in time, i.e. the
    /// mapping automation is usable, regardless of current mappings.
    pub async fn check_status(&self) -> bool {
        self.external_ip().await.is_ok()
    }
}

/// Pure half of `is_open`, factored out for tests.
pub fn mapping_exists(mappings: &[PortMapping], port: u16) -> bool {
    mappings.iter().any(|m| m.external_port == port)
}

async fn collect_mappings(gateway: &Gateway) -> Result<Vec<PortMapping>, ExposureError> {
    let mut out = Vec::new();
    for index in 0..MAX_MAPPING_ENTRIES {
        match gateway.get_generic_port_mapping_entry(index).await {
            Ok(entry) => out.push(PortMapping {
                external_port: entry.external_port,
                internal_port: entry.internal_port,
                protocol: entry.protocol.to_string(),
                internal_client: entry.internal_client,
                description: entry.port_mapping_description,
                lease_seconds: entry.lease_duration,
            }),
            // Routers signal end-of-table with SpecifiedArrayIndexInvalid but
            // some answer with other errors; either way the scan is done.
            Err(e) => {
                debug!(index, error = %e, "mapping table scan ended");
                break;
            }
        }
    }
    Ok(out)
}

fn mapping_protocol(transport: Transport) -> PortMappingProtocol {
    match transport {
        Transport::Tcp => PortMappingProtocol::TCP,
        Transport::Udp => PortMappingProtocol::UDP,
    }
}

/// Source address the OS would use to reach the gateway; registered as the
/// mapping's internal client.
fn lan_address_for(gateway: SocketAddr) -> Result<IpAddr, std::io::Error> {
    let probe = std::net::UdpSocket::bind(("0.0.0.0", 0))?;
    probe.connect(gateway)?;
    Ok(probe.local_addr()?.ip())
}
