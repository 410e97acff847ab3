//! Shared fixtures for handler tests

use anyhow::Result;
use async_trait::async_trait;
use linkscope_core::MacAddr;
use linkscope_discovery::{DiscoveryScanner, Environment, Platform, Prober};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::Config;
use crate::state::AppState;

/// Hosts .1 and .2 answer ping; nothing else responds
pub struct LowHostsProber;

#[async_trait]
impl Prober for LowHostsProber {
    async fn ping(&self, ip: Ipv4Addr) -> Result<bool> {
        Ok(ip.octets()[3] < 3)
    }
    async fn connect(&self, _ip: Ipv4Addr, _port: u16) -> Result<bool> {
        Ok(false)
    }
    async fn neighbor_mac(&self, _ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        Ok(None)
    }
    async fn reverse_dns(&self, _ip: Ipv4Addr) -> Result<Option<String>> {
        Ok(None)
    }
}

/// App state over [`LowHostsProber`] with gateway 192.168.1.1
pub fn state_with(config: Config) -> Arc<AppState> {
    let environment = Environment {
        platform: Platform::Posix,
        is_compat_layer: false,
        gateway_ip: Some(Ipv4Addr::new(192, 168, 1, 1)),
    };
    let scanner = Arc::new(DiscoveryScanner::with_prober(
        config.discovery.clone(),
        environment,
        Arc::new(LowHostsProber),
    ));
    AppState::new(config, scanner)
}
