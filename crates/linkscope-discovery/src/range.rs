//! Scan target parsing

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid base address in scan range: {0}")]
    InvalidAddress(String),
    #[error("Invalid prefix length in scan range: {0}")]
    InvalidPrefix(String),
}

/// The first three octets of a /24 network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Network24([u8; 3]);

impl Network24 {
    /// The /24 containing `ip`
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }

    /// Address with the given last octet
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, suffix)
    }

    /// Host addresses .1 through .254
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (1..=254u8).map(move |suffix| self.host(suffix))
    }
}

impl fmt::Display for Network24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

/// A parsed `{base}/{cidr}` scan target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// The /24 the liveness sweep covers
    pub network: Network24,
    /// Prefix length as given (default 24)
    pub cidr: u8,
}

impl ScanRange {
    /// Range covering the /24 of a local interface address
    pub fn around(ip: Ipv4Addr, cidr: u8) -> Self {
        Self {
            network: Network24::of(ip),
            cidr: cidr.min(32),
        }
    }
}

/// Renders in the form [`parse_ip_range`] accepts, e.g. `192.168.1.0/24`
impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.0/{}", self.network, self.cidr)
    }
}

/// Parse `"192.168.1.0/24"` or a bare `"10.0.0.5"` (prefix defaults to 24)
pub fn parse_ip_range(ip_range: &str) -> Result<ScanRange, RangeError> {
    let ip_range = ip_range.trim();
    let (base, cidr) = match ip_range.split_once('/') {
        Some((base, cidr)) => {
            let cidr: u8 = cidr
                .trim()
                .parse()
                .ok()
                .filter(|c| *c <= 32)
                .ok_or_else(|| RangeError::InvalidPrefix(ip_range.to_string()))?;
            (base, cidr)
        }
        None => (ip_range, 24),
    };

    let base: Ipv4Addr = base
        .trim()
        .parse()
        .map_err(|_| RangeError::InvalidAddress(ip_range.to_string()))?;

    Ok(ScanRange {
        network: Network24::of(base),
        cidr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        let range = parse_ip_range("192.168.1.0/24").unwrap();
        assert_eq!(range.network.to_string(), "192.168.1");
        assert_eq!(range.cidr, 24);
    }

    #[test]
    fn test_range_display_parses_back() {
        let range = ScanRange::around(Ipv4Addr::new(10, 1, 2, 77), 16);
        assert_eq!(range.to_string(), "10.1.2.0/16");
        assert_eq!(parse_ip_range(&range.to_string()).unwrap(), range);
    }

    #[test]
    fn test_parse_bare_address_defaults_to_24() {
        let range = parse_ip_range("10.0.0.5").unwrap();
        assert_eq!(range.network.to_string(), "10.0.0");
        assert_eq!(range.cidr, 24);
    }

    #[test]
    fn test_parse_wider_prefix_keeps_first_three_octets() {
        let range = parse_ip_range("172.16.5.9/16").unwrap();
        assert_eq!(range.network.to_string(), "172.16.5");
        assert_eq!(range.cidr, 16);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_ip_range("not-an-ip"), Err(RangeError::InvalidAddress(_))));
        assert!(matches!(parse_ip_range("192.168.1/24"), Err(RangeError::InvalidAddress(_))));
        assert!(matches!(parse_ip_range("192.168.1.0/33"), Err(RangeError::InvalidPrefix(_))));
        assert!(matches!(parse_ip_range("192.168.1.0/x"), Err(RangeError::InvalidPrefix(_))));
    }

    #[test]
    fn test_network_hosts() {
        let network = Network24::of(Ipv4Addr::new(192, 168, 7, 200));
        let hosts: Vec<_> = network.hosts().collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 7, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 7, 254));
    }
}
