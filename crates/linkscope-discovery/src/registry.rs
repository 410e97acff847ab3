//! In-memory device registry shared between the scanner and readers

use linkscope_core::{Device, DeviceMap};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tokio::sync::RwLock;

/// Lock-guarded device map. Readers get copies; the only write is a
/// whole-map replacement, so no reader ever sees a half-updated scan.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<DeviceMap>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all devices, ordered by IP
    pub async fn snapshot(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn get(&self, ip: Ipv4Addr) -> Option<Device> {
        self.devices.read().await.get(&ip).cloned()
    }

    /// `connected_to` of every device, used to seed the next cycle
    pub async fn connections(&self) -> HashMap<Ipv4Addr, Vec<Ipv4Addr>> {
        self.devices
            .read()
            .await
            .iter()
            .map(|(ip, device)| (*ip, device.connected_to.clone()))
            .collect()
    }

    /// Swap in the result of a completed scan
    pub async fn replace(&self, devices: DeviceMap) {
        *self.devices.write().await = devices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkscope_core::MacAddr;

    #[tokio::test]
    async fn test_replace_swaps_whole_map() {
        let registry = DeviceRegistry::new();
        assert!(registry.snapshot().await.is_empty());

        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);
        let mut first = DeviceMap::new();
        first.insert(a, Device::new(a, MacAddr::UNKNOWN));
        registry.replace(first).await;

        let mut second = DeviceMap::new();
        let mut device = Device::new(b, MacAddr::UNKNOWN);
        device.connected_to = vec![a];
        second.insert(b, device);
        registry.replace(second).await;

        assert_eq!(registry.snapshot().await.len(), 1);
        assert!(registry.get(a).await.is_none());
        assert_eq!(registry.connections().await.get(&b), Some(&vec![a]));
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let registry = DeviceRegistry::new();
        let ip = Ipv4Addr::new(10, 0, 0, 9);
        let mut map = DeviceMap::new();
        map.insert(ip, Device::new(ip, MacAddr::UNKNOWN));
        registry.replace(map).await;

        let mut snapshot = registry.snapshot().await;
        snapshot[0].is_gateway = true;
        assert!(!registry.get(ip).await.unwrap().is_gateway);
    }
}
