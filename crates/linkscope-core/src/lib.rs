//! LinkScope Core - Device types, vendor lookup, and topology estimation
//!
//! This crate provides the foundational types for the LinkScope system:
//! - Validated device records keyed by IPv4 address
//! - MAC address parsing and a small static OUI vendor table
//! - Star-topology estimation rooted at the gateway

pub mod device;
pub mod oui;
pub mod topology;

pub use device::{Device, DeviceError, DeviceMap, MacAddr};
pub use oui::lookup_vendor;
pub use topology::{estimate_topology, Topology, TopologyEdge, TopologyNode};
