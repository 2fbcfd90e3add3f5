//! Local address lookup for the displayed server URL.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

/// Resolves the address clients should use to reach this device.
///
/// Called every time a URL is published; results must not be cached.
pub trait AddressResolver: Send + Sync {
    fn local_address(&self) -> Option<IpAddr>;
}

/// Always answers with the same address.
#[derive(Debug, Clone, Copy)]
pub struct FixedAddress(pub IpAddr);

impl AddressResolver for FixedAddress {
    fn local_address(&self) -> Option<IpAddr> {
        Some(self.0)
    }
}

/// Finds the address of the interface that routes to `probe`.
///
/// Connecting a UDP socket only selects a route; no packet is sent.
#[derive(Debug, Clone, Copy)]
pub struct OutboundInterfaceResolver {
    probe: SocketAddr,
}

impl OutboundInterfaceResolver {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl Default for OutboundInterfaceResolver {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 9))
    }
}

impl AddressResolver for OutboundInterfaceResolver {
    fn local_address(&self) -> Option<IpAddr> {
        let bind_addr: SocketAddr = match self.probe {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = match UdpSocket::bind(bind_addr) {
            Ok(socket) => socket,
            Err(e) => {
                debug!("Failed to bind probe socket: {e}");
                return None;
            }
        };

        if let Err(e) = socket.connect(self.probe) {
            debug!("No route towards {}: {e}", self.probe);
            return None;
        }

        socket
            .local_addr()
            .ok()
            .map(|addr| addr.ip())
            .filter(|ip| !ip.is_unspecified())
    }
}
