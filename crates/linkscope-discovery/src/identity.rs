//! Device identity: MAC address, hostname and vendor for a live IP

use linkscope_core::{lookup_vendor, MacAddr};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::prober::Prober;

/// What could be learned about one host. Every field is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub mac: MacAddr,
    pub hostname: Option<String>,
    pub manufacturer: Option<String>,
}

/// Resolve MAC, hostname and vendor for `ip`. Never fails.
pub async fn resolve(prober: &dyn Prober, ip: Ipv4Addr) -> Identity {
    // Freshen the neighbor cache before reading it
    if let Err(e) = prober.ping(ip).await {
        trace!(ip = %ip, error = %e, "Warm-up ping failed");
    }

    let mac = resolve_mac(prober, ip).await;
    let hostname = match prober.reverse_dns(ip).await {
        Ok(name) => name,
        Err(e) => {
            debug!(ip = %ip, error = %e, "Hostname lookup failed");
            None
        }
    };
    let manufacturer = lookup_vendor(&mac).map(str::to_string);

    Identity {
        mac,
        hostname,
        manufacturer,
    }
}

/// MAC from the neighbor table, or [`MacAddr::UNKNOWN`]
pub async fn resolve_mac(prober: &dyn Prober, ip: Ipv4Addr) -> MacAddr {
    match prober.neighbor_mac(ip).await {
        Ok(Some(mac)) => mac,
        Ok(None) => MacAddr::UNKNOWN,
        Err(e) => {
            debug!(ip = %ip, error = %e, "MAC lookup failed");
            MacAddr::UNKNOWN
        }
    }
}

fn mac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(?:[0-9a-f]{2}[:-]){5}[0-9a-f]{2}").unwrap())
}

/// First colon- or hyphen-delimited MAC in neighbor-table output
pub fn parse_mac(output: &str) -> Option<MacAddr> {
    mac_pattern()
        .find(output)
        .and_then(|m| m.as_str().parse().ok())
}
