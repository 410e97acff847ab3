//! ICMP ping sweep across a /24

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::pool::run_bounded;
use crate::prober::Prober;
use crate::range::Network24;

/// Default number of pings in flight
pub const PING_CONCURRENCY: usize = 50;

/// Ping .1 through .254 of `network` and return the hosts that replied.
///
/// Failed or timed-out probes count as no reply. Hosts not yet probed when
/// `cancel` fires are skipped.
pub async fn ping_sweep(
    prober: &Arc<dyn Prober>,
    network: Network24,
    concurrency: usize,
    cancel: &CancellationToken,
) -> BTreeSet<Ipv4Addr> {
    let results = run_bounded(network.hosts(), concurrency, |ip| {
        let prober = prober.clone();
        let cancel = cancel.clone();
        async move {
            if cancel.is_cancelled() {
                return None;
            }
            match prober.ping(ip).await {
                Ok(true) => Some(ip),
                Ok(false) => None,
                Err(e) => {
                    debug!(ip = %ip, error = %e, "Ping failed");
                    None
                }
            }
        }
    })
    .await;

    let live: BTreeSet<Ipv4Addr> = results.into_iter().flatten().collect();
    debug!(network = %network, live = live.len(), "Ping sweep finished");
    live
}
