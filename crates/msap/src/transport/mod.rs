// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! UDP transport for SAP multicast send/receive.
//!
//! A single socket bound to the SAP port is shared between the announcer
//! (send) and the listener (receive). Multicast loopback is enabled so
//! an announcer and listener on the same host discover each other.

pub mod multicast;

use crate::config::{SAP_MULTICAST_IP, SAP_PORT};
use crate::error::{Error, Result};
use crate::transport::multicast::{get_primary_interface_ip, join_multicast_group};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;

/// Shared SAP multicast socket.
///
/// Bound to `0.0.0.0:9875` with `SO_REUSEADDR` so multiple SAP tools can
/// coexist on one host, joined to 224.2.127.254 on all interfaces.
pub struct MulticastTransport {
    /// Shared UDP socket (Arc for the listener's receive thread).
    socket: Arc<UdpSocket>,
    /// SAP multicast destination (224.2.127.254:9875).
    multicast_addr: SocketAddr,
    /// Interface the socket sends through, used as the originating source.
    iface: Ipv4Addr,
}

impl MulticastTransport {
    /// Bind the SAP socket and join the multicast group.
    pub fn new() -> Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::BindFailed(e.to_string()))?;
        socket2
            .set_reuse_address(true)
            .map_err(|e| Error::BindFailed(e.to_string()))?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SAP_PORT);
        socket2
            .bind(&SocketAddr::V4(bind_addr).into())
            .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;
        log::debug!("[SAP] transport bound to {}", bind_addr);

        let socket: UdpSocket = socket2.into();
        let iface = match join_multicast_group(&socket) {
            Ok(iface) => iface,
            Err(e) => return Err(Error::MulticastJoinFailed(e.to_string())),
        };

        let multicast_addr =
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(SAP_MULTICAST_IP), SAP_PORT));
        log::debug!(
            "[SAP] transport ready multicast={} iface={}",
            multicast_addr,
            iface
        );

        Ok(Self {
            socket: Arc::new(socket),
            multicast_addr,
            iface,
        })
    }

    /// Send one SAP packet to the multicast group.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        match self.socket.send_to(data, self.multicast_addr) {
            Ok(sent) => {
                log::debug!(
                    "[SAP] send {} bytes -> {} iface={}",
                    sent,
                    self.multicast_addr,
                    self.iface
                );
                Ok(())
            }
            Err(e) => {
                log::debug!("[SAP] send error={} dest={}", e, self.multicast_addr);
                Err(Error::SendFailed(e.to_string()))
            }
        }
    }

    /// Shared socket reference for the listener's receive thread.
    #[must_use]
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Source address advertised in SAP headers and SDP origin lines.
    ///
    /// Falls back to interface discovery when the join happened on the
    /// unspecified interface.
    #[must_use]
    pub fn source_ip(&self) -> IpAddr {
        if self.iface.is_unspecified() {
            if let Ok(ip) = get_primary_interface_ip() {
                return IpAddr::V4(ip);
            }
        }
        IpAddr::V4(self.iface)
    }

    /// Multicast destination address.
    #[must_use]
    pub fn multicast_addr(&self) -> SocketAddr {
        self.multicast_addr
    }
}
