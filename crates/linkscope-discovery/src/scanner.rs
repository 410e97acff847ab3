//! Discovery scanner that combines all discovery methods

use chrono::{DateTime, Utc};
use linkscope_core::{estimate_topology, Device, DeviceMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::environment::{detect_environment, Environment};
use crate::identity::{resolve, resolve_mac};
use crate::liveness::{ping_sweep, PING_CONCURRENCY};
use crate::pool::run_bounded;
use crate::ports::{probe_candidates, DEFAULT_PORTS, IOT_PORTS, PORT_CONCURRENCY, SPECIAL_SUFFIXES};
use crate::prober::{ProbeTimeouts, Prober, SystemProber};
use crate::range::{parse_ip_range, Network24, RangeError};
use crate::registry::DeviceRegistry;

/// Hostname given to a gateway synthesized under a compatibility layer
pub const GATEWAY_LABEL: &str = "Gateway";
/// Hostname given to the outer machine found under a compatibility layer
pub const OUTER_HOST_LABEL: &str = "Windows Host";
/// Low addresses on the gateway's /24 searched for the outer machine
const OUTER_HOST_SUFFIXES: std::ops::Range<u8> = 1..20;

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Scan target, `{base}/{cidr}`
    pub ip_range: String,
    /// Pause between periodic scans in seconds
    pub interval_secs: u64,
    /// Pings in flight during the liveness sweep
    pub ping_concurrency: usize,
    /// Reply timeout for one ping
    pub ping_timeout_ms: u64,
    /// Timeout for one TCP connect
    pub connect_timeout_ms: u64,
    /// Hosts port-probed in parallel
    pub port_concurrency: usize,
    /// Hosts identity-resolved in parallel
    pub resolve_concurrency: usize,
    /// Timeout for one reverse-DNS lookup
    pub dns_timeout_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ip_range: "192.168.1.0/24".to_string(),
            interval_secs: 10,
            ping_concurrency: PING_CONCURRENCY,
            ping_timeout_ms: 1000,
            connect_timeout_ms: 100,
            port_concurrency: PORT_CONCURRENCY,
            resolve_concurrency: 32,
            dns_timeout_ms: 2000,
        }
    }
}

impl ScannerConfig {
    pub fn probe_timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            ping: Duration::from_millis(self.ping_timeout_ms),
            connect: Duration::from_millis(self.connect_timeout_ms),
            dns: Duration::from_millis(self.dns_timeout_ms),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Scan lifecycle event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    ScanStarted { range: String },
    ScanCompleted { found: usize },
    ScanFailed { error: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    InvalidRange(#[from] RangeError),
    #[error("Scan cancelled")]
    Cancelled,
}

/// Result of a `scan_network` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The cycle ran and the registry now holds `found` devices
    Completed { found: usize },
    /// Another scan was in flight; this request was dropped
    Skipped,
}

/// Record of the last successful cycle
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub range: String,
    pub device_count: usize,
    pub finished_at: DateTime<Utc>,
}

/// Clears the busy flag when dropped, whatever way the cycle ends
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Discovery scanner service
pub struct DiscoveryScanner {
    config: ScannerConfig,
    environment: Environment,
    prober: Arc<dyn Prober>,
    registry: DeviceRegistry,
    scanning: AtomicBool,
    last_scan: RwLock<Option<ScanSummary>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    shutdown: CancellationToken,
}

impl DiscoveryScanner {
    /// Detect the environment and probe with the host's OS tools
    pub async fn new(config: ScannerConfig) -> Self {
        let environment = detect_environment().await;
        let prober = Arc::new(SystemProber::new(environment.platform, config.probe_timeouts()));
        Self::with_prober(config, environment, prober)
    }

    /// Build a scanner from an already-known environment and prober
    pub fn with_prober(
        config: ScannerConfig,
        environment: Environment,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            environment,
            prober,
            registry: DeviceRegistry::new(),
            scanning: AtomicBool::new(false),
            last_scan: RwLock::new(None),
            event_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Get current device list
    pub async fn devices(&self) -> Vec<Device> {
        self.registry.snapshot().await
    }

    pub async fn get_device(&self, ip: Ipv4Addr) -> Option<Device> {
        self.registry.get(ip).await
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub async fn last_scan(&self) -> Option<ScanSummary> {
        self.last_scan.read().await.clone()
    }

    /// Stop the periodic driver and abort any in-flight cycle at its next
    /// step boundary
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one scan cycle over `ip_range` and replace the registry with its
    /// result. Returns [`ScanOutcome::Skipped`] without doing anything if a
    /// scan is already running. On error the registry is left untouched.
    pub async fn scan_network(&self, ip_range: &str) -> Result<ScanOutcome, ScanError> {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            info!(range = %ip_range, "Scan already in progress, request dropped");
            return Ok(ScanOutcome::Skipped);
        };

        let _ = self.event_tx.send(DiscoveryEvent::ScanStarted {
            range: ip_range.to_string(),
        });
        info!(range = %ip_range, "Starting network scan");

        match self.run_cycle(ip_range).await {
            Ok(devices) => {
                let found = devices.len();
                self.registry.replace(devices).await;
                *self.last_scan.write().await = Some(ScanSummary {
                    range: ip_range.to_string(),
                    device_count: found,
                    finished_at: Utc::now(),
                });
                let _ = self.event_tx.send(DiscoveryEvent::ScanCompleted { found });
                info!(found, "Scan complete");
                Ok(ScanOutcome::Completed { found })
            }
            Err(e) => {
                warn!(range = %ip_range, error = %e, "Scan failed");
                let _ = self.event_tx.send(DiscoveryEvent::ScanFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Spawn the periodic driver on the runtime
    pub fn start_periodic_scan(
        self: &Arc<Self>,
        ip_range: impl Into<String>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let scanner = self.clone();
        let ip_range = ip_range.into();
        info!(range = %ip_range, interval_secs = interval.as_secs(), "Periodic scan started");
        tokio::spawn(async move { scanner.run_periodic(&ip_range, interval).await })
    }

    /// Scan, sleep `interval`, repeat until [`shutdown`](Self::shutdown)
    pub async fn run_periodic(&self, ip_range: &str, interval: Duration) {
        while !self.shutdown.is_cancelled() {
            if let Err(ScanError::Cancelled) = self.scan_network(ip_range).await {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Periodic scan stopped");
    }

    fn checkpoint(&self) -> Result<(), ScanError> {
        if self.shutdown.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// One full cycle, producing the next device map
    async fn run_cycle(&self, ip_range: &str) -> Result<DeviceMap, ScanError> {
        let prior_links = self.registry.connections().await;
        let range = parse_ip_range(ip_range)?;
        let gateway_ip = self.environment.gateway_ip;

        // Step 1: Ping sweep of the /24
        self.checkpoint()?;
        let live = ping_sweep(
            &self.prober,
            range.network,
            self.config.ping_concurrency,
            &self.shutdown,
        )
        .await;
        info!(network = %range.network, live = live.len(), "Ping sweep found hosts");

        // Step 2: Port-probe well-known addresses that ignored ping
        self.checkpoint()?;
        let mut active: BTreeSet<Ipv4Addr> = live.clone();
        if range.cidr <= 24 {
            let candidates: Vec<Ipv4Addr> = SPECIAL_SUFFIXES
                .iter()
                .map(|&suffix| range.network.host(suffix))
                .filter(|ip| !live.contains(ip))
                .collect();

            for (ip, open_ports) in probe_candidates(
                &self.prober,
                candidates,
                IOT_PORTS,
                self.config.port_concurrency,
            )
            .await
            {
                info!(ip = %ip, ports = ?open_ports, "Port probe found additional host");
                active.insert(ip);
            }
        }

        // Step 3: Resolve identity of every active host
        self.checkpoint()?;
        let identities = run_bounded(active, self.config.resolve_concurrency, |ip| {
            let prober = self.prober.clone();
            async move { (ip, resolve(prober.as_ref(), ip).await) }
        })
        .await;

        let mut devices = DeviceMap::new();
        for (ip, identity) in identities {
            devices.insert(
                ip,
                Device {
                    ip,
                    mac: identity.mac,
                    manufacturer: identity.manufacturer,
                    hostname: identity.hostname,
                    is_gateway: Some(ip) == gateway_ip,
                    connected_to: prior_links.get(&ip).cloned().unwrap_or_default(),
                },
            );
        }

        // Step 4: Compatibility layers hide the LAN behind NAT
        if let (true, Some(gateway)) = (self.environment.is_compat_layer, gateway_ip) {
            self.checkpoint()?;
            self.add_compat_hosts(&mut devices, gateway).await;
        }

        // Step 5: Topology
        let gateway = estimate_topology(&mut devices, gateway_ip);
        debug!(gateway = ?gateway, devices = devices.len(), "Topology estimated");

        self.checkpoint()?;
        Ok(devices)
    }

    /// Ensure the gateway is present and look for the outer machine among
    /// the low addresses of the gateway's /24
    async fn add_compat_hosts(&self, devices: &mut DeviceMap, gateway: Ipv4Addr) {
        info!(gateway = %gateway, "Compatibility layer detected, probing gateway and outer host");

        if !devices.contains_key(&gateway) {
            let mac = resolve_mac(self.prober.as_ref(), gateway).await;
            let mut device = Device::new(gateway, mac)
                .with_hostname(GATEWAY_LABEL)
                .with_vendor_lookup();
            device.is_gateway = true;
            devices.insert(gateway, device);
        }

        let network = Network24::of(gateway);
        let gateway_suffix = gateway.octets()[3];
        let candidates: Vec<Ipv4Addr> = OUTER_HOST_SUFFIXES
            .filter(|&suffix| suffix != gateway_suffix)
            .map(|suffix| network.host(suffix))
            .filter(|ip| !devices.contains_key(ip))
            .collect();

        for (ip, _) in probe_candidates(
            &self.prober,
            candidates,
            DEFAULT_PORTS,
            self.config.port_concurrency,
        )
        .await
        {
            let mac = resolve_mac(self.prober.as_ref(), ip).await;
            let mut device = Device::new(ip, mac)
                .with_hostname(OUTER_HOST_LABEL)
                .with_vendor_lookup();
            device.connected_to = vec![gateway];
            info!(ip = %ip, "Found outer host candidate");
            devices.insert(ip, device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_releases() {
        let flag = AtomicBool::new(false);
        {
            let guard = ScanGuard::acquire(&flag);
            assert!(guard.is_some());
            assert!(ScanGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(ScanGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_config_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.ip_range, "192.168.1.0/24");
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.ping_concurrency, 50);
        assert_eq!(config.probe_timeouts().connect, Duration::from_millis(100));
    }
}
