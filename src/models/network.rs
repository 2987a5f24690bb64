// Network transport selectors and gateway mapping entries

use serde::{Deserialize, Serialize};

/// Transport selector for allocation and exposure requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Both,
}

impl Protocol {
    /// Concrete transports this selector expands to. `Both` becomes two
    /// sequential sub-operations everywhere it is consumed.
    pub fn transports(&self) -> &'static [Transport] {
        match self {
            Protocol::Tcp => &[Transport::Tcp],
            Protocol::Udp => &[Transport::Udp],
            Protocol::Both => &[Transport::Tcp, Transport::Udp],
        }
    }
}

/// A single concrete transport (never `Both`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Uppercase label used in mapping descriptions and firewall rule names.
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

/// One entry from the gateway's NAT table. Ephemeral: queried live, never
/// persisted. Absence of an entry does not imply the port is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub external_port: u16,
    pub internal_port: u16,
    pub protocol: String,
    pub internal_client: String,
    pub description: String,
    pub lease_seconds: u32,
}
