//! Device types for tracking discovered hosts

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when building a device from untrusted input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidIp(String),
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
}

/// Devices of one scan cycle, keyed by IP
pub type DeviceMap = BTreeMap<Ipv4Addr, Device>;

/// Hardware address in lowercase colon-separated form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Sentinel for "not resolved"
    pub const UNKNOWN: MacAddr = MacAddr([0; 6]);

    /// True for the all-zero sentinel
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// First three octets as "aa:bb:cc"
    pub fn oui_prefix(&self) -> String {
        format!("{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl Default for MacAddr {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = DeviceError;

    /// Accepts six hex octets separated by ':' or '-', any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeviceError::InvalidMac(s.to_string());
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A discovered host on the local subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// IPv4 address, unique within a scan cycle
    pub ip: Ipv4Addr,
    /// Hardware address ([`MacAddr::UNKNOWN`] when unresolved)
    pub mac: MacAddr,
    /// Vendor label derived from the MAC prefix
    pub manufacturer: Option<String>,
    /// Reverse-DNS name
    pub hostname: Option<String>,
    /// Whether this device is the subnet gateway
    pub is_gateway: bool,
    /// Inferred upstream links (empty for the gateway)
    pub connected_to: Vec<Ipv4Addr>,
}

impl Device {
    /// Create a device with no identity beyond its address
    pub fn new(ip: Ipv4Addr, mac: MacAddr) -> Self {
        Self {
            ip,
            mac,
            manufacturer: None,
            hostname: None,
            is_gateway: false,
            connected_to: Vec::new(),
        }
    }

    /// Build a device from textual IP and MAC, validating both
    pub fn parse(ip: &str, mac: &str) -> Result<Self, DeviceError> {
        let ip = Ipv4Addr::from_str(ip.trim())
            .map_err(|_| DeviceError::InvalidIp(ip.to_string()))?;
        let mac = mac.parse()?;
        Ok(Self::new(ip, mac))
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Attach the vendor label for this device's MAC, if the table knows it
    pub fn with_vendor_lookup(mut self) -> Self {
        self.manufacturer = crate::oui::lookup_vendor(&self.mac).map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_normalizes() {
        let mac: MacAddr = "AC-DE-48-01-02-03".parse().unwrap();
        assert_eq!(mac.to_string(), "ac:de:48:01:02:03");
        assert_eq!(mac.oui_prefix(), "ac:de:48");
    }

    #[test]
    fn test_mac_parse_rejects_malformed() {
        assert!("ac:de:48:01:02".parse::<MacAddr>().is_err());
        assert!("ac:de:48:01:02:zz".parse::<MacAddr>().is_err());
        assert!("acde48010203".parse::<MacAddr>().is_err());
        assert!("a:de:48:01:02:03".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_unknown_sentinel() {
        let mac: MacAddr = "00:00:00:00:00:00".parse().unwrap();
        assert!(mac.is_unknown());
        assert_eq!(MacAddr::default(), MacAddr::UNKNOWN);
    }

    #[test]
    fn test_device_parse_validates() {
        let device = Device::parse("192.168.1.10", "b8:27:eb:00:11:22").unwrap();
        assert_eq!(device.ip, Ipv4Addr::new(192, 168, 1, 10));
        assert!(!device.is_gateway);
        assert!(device.connected_to.is_empty());

        assert_eq!(
            Device::parse("192.168.1", "b8:27:eb:00:11:22"),
            Err(DeviceError::InvalidIp("192.168.1".to_string()))
        );
        assert!(matches!(
            Device::parse("192.168.1.10", "nope"),
            Err(DeviceError::InvalidMac(_))
        ));
    }

    #[test]
    fn test_wire_shape() {
        let mut device = Device::parse("192.168.1.50", "B8:27:EB:00:11:22")
            .unwrap()
            .with_vendor_lookup();
        device.connected_to = vec![Ipv4Addr::new(192, 168, 1, 1)];

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ip": "192.168.1.50",
                "mac": "b8:27:eb:00:11:22",
                "manufacturer": "Raspberry Pi",
                "hostname": null,
                "is_gateway": false,
                "connected_to": ["192.168.1.1"]
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_bad_mac() {
        let json = r#"{"ip":"10.0.0.2","mac":"xx","manufacturer":null,
            "hostname":null,"is_gateway":false,"connected_to":[]}"#;
        assert!(serde_json::from_str::<Device>(json).is_err());
    }
}
