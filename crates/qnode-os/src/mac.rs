#[cfg(target_os = "linux")]
mod os_mac {
    use std::fs;
    use std::path::Path;

    use tracing::warn;

    const ARPHRD_ETHER: u16 = 1;

    // OUIs of common hypervisor network adapters.
    const VIRTUAL_OUIS: &[[u8; 3]] = &[
        [0x00, 0x05, 0x69],
        [0x00, 0x0C, 0x29],
        [0x00, 0x50, 0x56],
        [0x00, 0x15, 0x5D],
        [0x08, 0x00, 0x27],
        [0x00, 0x1C, 0x42],
    ];

    const VIRTUAL_PREFIXES: &[&str] = &["lo", "docker", "br-", "veth", "tun", "tap", "vmnet"];

    pub(super) fn parse_mac(text: &str) -> Option<[u8; 6]> {
        let mut mac = [0u8; 6];
        let mut parts = text.trim().split(':');
        for byte in &mut mac {
            *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
        }
        parts.next().is_none().then_some(mac)
    }

    pub(super) fn is_virtual_mac(mac: [u8; 6]) -> bool {
        // Locally administered bit.
        (mac[0] & 0x02) != 0 || VIRTUAL_OUIS.iter().any(|oui| oui == &mac[..3])
    }

    fn is_physical(iface: &Path, mac: [u8; 6]) -> bool {
        if !iface.join("device").exists() || is_virtual_mac(mac) {
            return false;
        }
        let name = iface.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        fs::read_to_string(iface.join("type"))
            .ok()
            .and_then(|t| t.trim().parse::<u16>().ok())
            == Some(ARPHRD_ETHER)
    }

    // Wireless interfaces win over wired ones.
    pub(crate) fn mac_address() -> Option<[u8; 6]> {
        let net = Path::new("/sys/class/net");
        let Ok(entries) = fs::read_dir(net) else {
            warn!("Unable to read {}", net.display());
            return None;
        };

        let mut wired = None;
        for iface in entries.flatten().map(|entry| entry.path()) {
            let Some(mac) = fs::read_to_string(iface.join("address"))
                .ok()
                .and_then(|text| parse_mac(&text))
            else {
                continue;
            };
            if !is_physical(&iface, mac) {
                continue;
            }
            if iface.join("wireless").exists() {
                return Some(mac);
            }
            wired = wired.or(Some(mac));
        }
        wired
    }

}

#[cfg(not(target_os = "linux"))]
mod os_mac {
    pub(crate) fn mac_address() -> Option<[u8; 6]> {
        None
    }
}

/// Returns the hardware address of the main network interface, formatted
/// as `AA:BB:CC:DD:EE:FF`.
pub(crate) fn mac_address() -> Option<String> {
    os_mac::mac_address().map(|mac| {
        mac.iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    })
}
