//! LinkScope Discovery - Host discovery and topology for a local IPv4 subnet
//!
//! This crate combines several probing methods:
//! - ICMP ping sweep across a /24 for liveness
//! - TCP connect probing for hosts that ignore ping
//! - ARP table and reverse-DNS lookups for device identity
//!
//! [`DiscoveryScanner`] drives them as one scan cycle and keeps the
//! resulting inventory in a [`DeviceRegistry`].

pub mod environment;
pub mod identity;
pub mod liveness;
mod pool;
pub mod ports;
pub mod prober;
pub mod range;
pub mod registry;
pub mod scanner;

pub use environment::{detect_environment, Environment, Platform};
pub use prober::{Prober, SystemProber};
pub use range::{parse_ip_range, Network24, RangeError, ScanRange};
pub use registry::DeviceRegistry;
pub use scanner::{
    DiscoveryEvent, DiscoveryScanner, ScanError, ScanOutcome, ScanSummary, ScannerConfig,
};
