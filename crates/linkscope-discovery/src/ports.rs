//! TCP connect probing for hosts that do not answer ping

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::pool::run_bounded;
use crate::prober::Prober;

/// Ports typical of smart-home and embedded devices
pub const IOT_PORTS: &[u16] = &[80, 443, 8080, 5000, 1883, 8883, 23, 22, 5353, 1900];

/// Short port set for locating the outer host under a compatibility layer
pub const DEFAULT_PORTS: &[u16] = &[80, 443, 22, 8080, 5000];

/// Last octets where routers and IoT devices commonly sit
pub const SPECIAL_SUFFIXES: &[u8] = &[1, 2, 3, 4, 10, 20, 30, 50, 100, 101, 102, 200, 201];

/// Default number of hosts probed in parallel
pub const PORT_CONCURRENCY: usize = 20;

/// Outcome of probing one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortProbe {
    pub is_active: bool,
    pub open_ports: Vec<u16>,
}

/// Try each port in turn; any accepted connect marks the host active.
/// Per-port errors are treated as closed.
pub async fn port_probe(prober: &dyn Prober, ip: Ipv4Addr, ports: &[u16]) -> PortProbe {
    let mut open_ports = Vec::new();
    for &port in ports {
        match prober.connect(ip, port).await {
            Ok(true) => open_ports.push(port),
            Ok(false) => {}
            Err(e) => trace!(ip = %ip, port, error = %e, "Connect probe failed"),
        }
    }

    PortProbe {
        is_active: !open_ports.is_empty(),
        open_ports,
    }
}

/// Probe every candidate in parallel and return the active ones with their
/// open ports
pub async fn probe_candidates(
    prober: &Arc<dyn Prober>,
    candidates: Vec<Ipv4Addr>,
    ports: &[u16],
    concurrency: usize,
) -> Vec<(Ipv4Addr, Vec<u16>)> {
    let total = candidates.len();
    let ports: Arc<[u16]> = ports.into();

    let mut active: Vec<(Ipv4Addr, Vec<u16>)> = run_bounded(candidates, concurrency, |ip| {
        let prober = prober.clone();
        let ports = ports.clone();
        async move {
            let probe = port_probe(prober.as_ref(), ip, &ports).await;
            probe.is_active.then_some((ip, probe.open_ports))
        }
    })
    .await
    .into_iter()
    .flatten()
    .collect();

    active.sort_by_key(|(ip, _)| *ip);
    debug!(probed = total, active = active.len(), "Port probe finished");
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Platform;
    use crate::prober::{ProbeTimeouts, SystemProber};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_no_listeners_is_inactive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = SystemProber::new(Platform::current(), ProbeTimeouts::default());
        let probe = port_probe(&prober, Ipv4Addr::LOCALHOST, &[port]).await;
        assert_eq!(probe, PortProbe { is_active: false, open_ports: vec![] });
    }

    #[tokio::test]
    async fn test_listener_is_active() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober: Arc<dyn Prober> =
            Arc::new(SystemProber::new(Platform::current(), ProbeTimeouts::default()));
        let active = probe_candidates(&prober, vec![Ipv4Addr::LOCALHOST], &[port], 4).await;
        assert_eq!(active, vec![(Ipv4Addr::LOCALHOST, vec![port])]);
    }
}
