//! Star-topology estimation rooted at the gateway
//!
//! This is an approximation: every host is assumed to hang directly off the
//! gateway. Multi-hop structure would need LLDP/CDP/SNMP data, which the
//! engine does not collect.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::device::{Device, DeviceMap};

/// Mark a gateway and attach every other device to it.
///
/// The gateway is the device at `gateway_ip` if present, else the first
/// device already flagged as gateway, else the first entry in map order.
/// Devices that already carry `connected_to` links keep them. Returns the
/// chosen gateway, or `None` for an empty map.
pub fn estimate_topology(
    devices: &mut DeviceMap,
    gateway_ip: Option<Ipv4Addr>,
) -> Option<Ipv4Addr> {
    let gateway = gateway_ip
        .filter(|ip| devices.contains_key(ip))
        .or_else(|| devices.values().find(|d| d.is_gateway).map(|d| d.ip))
        .or_else(|| devices.keys().next().copied())?;

    if gateway_ip != Some(gateway) {
        debug!(
            gateway = %gateway,
            detected = ?gateway_ip,
            "Detected gateway absent, picked fallback"
        );
    }

    for (ip, device) in devices.iter_mut() {
        if *ip == gateway {
            device.is_gateway = true;
            device.connected_to.clear();
        } else {
            device.is_gateway = false;
            if device.connected_to.is_empty() {
                device.connected_to = vec![gateway];
            }
        }
    }

    Some(gateway)
}

/// A node in the topology graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNode {
    pub ip: Ipv4Addr,
    /// Hostname if known, otherwise the IP
    pub label: String,
    pub manufacturer: Option<String>,
    pub is_gateway: bool,
}

/// Directed link from a device to its upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
}

/// Serializable graph view of a device inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub root: Option<Ipv4Addr>,
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    /// Build the graph from devices that have already been through
    /// [`estimate_topology`]
    pub fn from_devices(devices: &[Device]) -> Self {
        let root = devices.iter().find(|d| d.is_gateway).map(|d| d.ip);

        let nodes = devices
            .iter()
            .map(|d| TopologyNode {
                ip: d.ip,
                label: d.hostname.clone().unwrap_or_else(|| d.ip.to_string()),
                manufacturer: d.manufacturer.clone(),
                is_gateway: d.is_gateway,
            })
            .collect();

        let edges = devices
            .iter()
            .flat_map(|d| {
                d.connected_to
                    .iter()
                    .map(move |&to| TopologyEdge { from: d.ip, to })
            })
            .collect();

        Self { root, nodes, edges }
    }
}
