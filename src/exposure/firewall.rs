// Host firewall fallback: inbound-allow rules keyed by a stable name so
// re-adding is idempotent (delete-if-exists, then add).

use super::ExposureError;
use crate::models::{Protocol, Transport};
use tokio::process::Command;
use tracing::debug;

/// Stable rule name, e.g. "GameWarden Port 27015 TCP". The same name is used
/// on add and remove so stale rules are replaced, never duplicated.
pub fn rule_name(tag: &str, port: u16, transport: Transport) -> String {
    format!("{} Port {} {}", tag, port, transport.label())
}

/// Adds an inbound-allow rule per transport, removing any prior rule of the
/// same name first.
pub async fn allow_inbound(tag: &str, port: u16, protocol: Protocol) -> Result<(), ExposureError> {
    for transport in protocol.transports() {
        // Errors from the delete pass are expected when no rule exists yet.
        if let Err(e) = remove_rule(tag, port, *transport).await {
            debug!(error = %e, port, transport = transport.label(), "no prior rule removed");
        }
        add_rule(tag, port, *transport).await?;
    }
    Ok(())
}

pub async fn remove_rules(tag: &str, port: u16, protocol: Protocol) -> Result<(), ExposureError> {
    let mut first_error = None;
    for transport in protocol.transports() {
        if let Err(e) = remove_rule(tag, port, *transport).await {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(target_os = "windows")]
async fn add_rule(tag: &str, port: u16, transport: Transport) -> Result<(), ExposureError> {
    let name = rule_name(tag, port, transport);
    run_checked(Command::new("netsh").args([
        "advfirewall",
        "firewall",
        "add",
        "rule",
        &format!("name={name}"),
        "dir=in",
        "action=allow",
        &format!("protocol={}", transport.label()),
        &format!("localport={port}"),
    ]))
    .await
}

#[cfg(target_os = "windows")]
async fn remove_rule(tag: &str, port: u16, transport: Transport) -> Result<(), ExposureError> {
    let name = rule_name(tag, port, transport);
    run_checked(Command::new("netsh").args([
        "advfirewall",
        "firewall",
        "delete",
        "rule",
        &format!("name={name}"),
    ]))
    .await
}

#[cfg(not(target_os = "windows"))]
async fn add_rule(tag: &str, port: u16, transport: Transport) -> Result<(), ExposureError> {
    let name = rule_name(tag, port, transport);
    let proto = transport.label().to_lowercase();
    run_checked(Command::new("iptables").args([
        "-A",
        "INPUT",
        "-p",
        &proto,
        "--dport",
        &port.to_string(),
        "-m",
        "comment",
        "--comment",
        &name,
        "-j",
        "ACCEPT",
    ]))
    .await
}

#[cfg(not(target_os = "windows"))]
async fn remove_rule(tag: &str, port: u16, transport: Transport) -> Result<(), ExposureError> {
    let name = rule_name(tag, port, transport);
    let proto = transport.label().to_lowercase();
    run_checked(Command::new("iptables").args([
        "-D",
        "INPUT",
        "-p",
        &proto,
        "--dport",
        &port.to_string(),
        "-m",
        "comment",
        "--comment",
        &name,
        "-j",
        "ACCEPT",
    ]))
    .await
}

async fn run_checked(command: &mut Command) -> Result<(), ExposureError> {
    let output = command
        .output()
        .await
        .map_err(|e| ExposureError::FirewallFailed(e.to_string()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ExposureError::FirewallFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_name_is_deterministic_per_port_and_transport() {
        assert_eq!(
            rule_name("GameWarden", 27015, Transport::Tcp),
            "GameWarden Port 27015 TCP"
        );
        assert_eq!(
            rule_name("GameWarden", 27015, Transport::Udp),
            "GameWarden Port 27015 UDP"
        );
        // Same inputs, same name: the delete-then-add cycle stays idempotent.
        assert_eq!(
            rule_name("GameWarden", 27015, Transport::Tcp),
            rule_name("GameWarden", 27015, Transport::Tcp)
        );
    }
}
