//! Application state management

use linkscope_core::{Device, Topology};
use linkscope_discovery::{DiscoveryEvent, DiscoveryScanner};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Discovery scanner
    pub scanner: Arc<DiscoveryScanner>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, scanner: Arc<DiscoveryScanner>) -> Arc<Self> {
        Arc::new(Self { scanner, config })
    }

    /// Get all devices
    pub async fn devices(&self) -> Vec<Device> {
        self.scanner.devices().await
    }

    /// Star graph of the current inventory
    pub async fn topology(&self) -> Topology {
        Topology::from_devices(&self.scanner.devices().await)
    }

    /// Subscribe to scan events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.scanner.subscribe()
    }
}
