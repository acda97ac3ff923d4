// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Multicast group management and interface discovery.
//!
//! Handles joining the SAP multicast group and discovering the network
//! interfaces announcements should go out on.

use crate::config::{SAP_MULTICAST_IP, SAP_MULTICAST_TTL};
use std::io;
use std::net::{Ipv4Addr, UdpSocket};

/// Join the SAP multicast group (224.2.127.254) on all available interfaces.
///
/// Joining on every non-loopback interface matters on multi-homed
/// hosts: announcements arrive on whichever NIC the sender is reachable
/// through, and a single-interface join silently misses the rest.
pub fn join_multicast_group(socket: &UdpSocket) -> io::Result<Ipv4Addr> {
    let group = Ipv4Addr::from(SAP_MULTICAST_IP);
    let interfaces = get_multicast_interfaces()?;

    if interfaces.is_empty() {
        log::debug!("[SAP] WARNING: No suitable interfaces found for multicast, using UNSPECIFIED");
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    } else {
        for iface in &interfaces {
            match socket.join_multicast_v4(&group, iface) {
                Ok(()) => {
                    log::debug!("[SAP] join_multicast_v4({}) on interface {}", group, iface);
                }
                Err(e) if e.raw_os_error() == Some(98) => {
                    // EADDRINUSE (98) Linux: already joined on same physical NIC
                    log::debug!(
                        "[SAP] join_multicast_v4({}) on {} - already joined, skipping",
                        group,
                        iface
                    );
                }
                Err(e) => {
                    // Non-fatal: skip interfaces that can't join multicast
                    log::debug!(
                        "[SAP] join_multicast_v4({}) on {} failed (non-fatal): {}",
                        group,
                        iface,
                        e
                    );
                }
            }
        }
    }

    // Loopback so announcer and listener on the same host see each other.
    socket.set_multicast_loop_v4(true)?;
    let _ = socket.set_multicast_ttl_v4(SAP_MULTICAST_TTL);

    // Return first interface for the SDP origin line (or UNSPECIFIED if none)
    Ok(interfaces.first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED))
}

/// Get all non-loopback IPv4 interfaces suitable for multicast.
///
/// Honors the `MSAP_MULTICAST_IF` environment variable to force a
/// specific interface (testing, docker0 avoidance).
pub fn get_multicast_interfaces() -> io::Result<Vec<Ipv4Addr>> {
    if let Ok(var) = std::env::var("MSAP_MULTICAST_IF") {
        if let Ok(addr) = var.parse::<Ipv4Addr>() {
            log::debug!("[SAP] Using MSAP_MULTICAST_IF override: {}", addr);
            return Ok(vec![addr]);
        }
        log::debug!(
            "[SAP] [!]  Invalid MSAP_MULTICAST_IF='{}' -- falling back to auto-detect",
            var
        );
    }

    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[SAP] Failed to list network interfaces: {}", e);
            return Ok(vec![]);
        }
    };

    let mut addrs = Vec::new();
    for (_name, ip) in interfaces {
        if let std::net::IpAddr::V4(ipv4) = ip {
            if !ipv4.is_loopback() {
                addrs.push(ipv4);
            }
        }
    }

    log::debug!("[SAP] Discovered {} non-loopback interfaces", addrs.len());
    Ok(addrs)
}

/// Get primary interface IP address (the one used for the default route).
///
/// Used as the originating source in SAP headers and SDP origin lines,
/// avoiding 0.0.0.0 on multi-interface machines (e.g. with docker0).
pub fn get_primary_interface_ip() -> io::Result<Ipv4Addr> {
    let interfaces = get_multicast_interfaces()?;

    if let Some(&ip) = interfaces.first() {
        log::debug!("[SAP] Using primary interface IP: {}", ip);
        return Ok(ip);
    }

    log::debug!("[SAP] WARNING: No suitable interface found, using UNSPECIFIED");
    Ok(Ipv4Addr::UNSPECIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_discovery_does_not_fail() {
        // Result content is machine-dependent; only the contract matters.
        let interfaces = get_multicast_interfaces().expect("interface discovery should not error");
        for iface in interfaces {
            assert!(!iface.is_loopback());
        }
    }

    #[test]
    #[ignore = "requires UDP socket, flaky in CI"]
    fn test_join_multicast_group() {
        let socket = UdpSocket::bind("0.0.0.0:0").expect("bind should succeed");
        let iface = join_multicast_group(&socket).expect("join should succeed");
        assert!(!iface.is_loopback());
    }
}
