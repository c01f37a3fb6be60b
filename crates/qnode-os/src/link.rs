use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use qnode::platform::Link;

use tracing::{debug, info};

use crate::mac::mac_address;

const HOSTNAME_PREFIX: &str = "qnode";

/// The host network stack seen as a node link.
///
/// The host network is managed by the operating system, so the link is up
/// as soon as it is started. The node address is the local address the
/// host would use to reach the broker.
#[derive(Debug)]
pub struct HostLink {
    remote: (String, u16),
    address: IpAddr,
    mac: Option<String>,
    up: bool,
}

impl HostLink {
    /// Creates a [`HostLink`] towards the broker at `host:port`.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            remote: (host.into(), port),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            mac: mac_address(),
            up: false,
        }
    }

    fn local_address(&self) -> Option<IpAddr> {
        // Connecting a datagram socket sends nothing, it only selects a
        // route.
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket
            .connect((self.remote.0.as_str(), self.remote.1))
            .ok()?;
        socket.local_addr().ok().map(|address| address.ip())
    }
}

impl Link for HostLink {
    fn begin(&mut self, hostname: &str) {
        if let Some(address) = self.local_address() {
            self.address = address;
        } else {
            debug!("No route towards {}:{}", self.remote.0, self.remote.1);
        }
        info!("Link up as `{hostname}` with address {}", self.address);
        self.up = true;
    }

    fn is_up(&self) -> bool {
        self.up
    }

    fn disconnect(&mut self) {
        info!("Link down");
        self.up = false;
    }

    fn default_hostname(&self) -> String {
        // The last three bytes of the hardware address.
        match self.mac.as_deref() {
            Some(mac) if mac.len() >= 8 => format!(
                "{HOSTNAME_PREFIX}-{}",
                mac[mac.len() - 8..].replace(':', "").to_lowercase()
            ),
            _ => HOSTNAME_PREFIX.into(),
        }
    }

    fn address(&self) -> String {
        self.address.to_string()
    }

    fn mac(&self) -> String {
        self.mac.clone().unwrap_or_default()
    }
}
