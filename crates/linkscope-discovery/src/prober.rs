//! Probing primitives: ping, TCP connect, neighbor-table and reverse-DNS lookups
//!
//! [`Prober`] is the seam between the scan logic and the operating system.
//! [`SystemProber`] shells out to the OS tools with the flag syntax of the
//! platform chosen at construction.

use anyhow::Result;
use async_trait::async_trait;
use linkscope_core::MacAddr;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

use crate::environment::Platform;
use crate::identity::parse_mac;

/// Extra time allowed for the ping process beyond its own reply timeout
const PROCESS_GRACE: Duration = Duration::from_secs(1);

/// Probing capability used by every discovery stage.
///
/// Implementations report operational failures as `Err`; callers treat
/// those as "no data for this host".
#[async_trait]
pub trait Prober: Send + Sync {
    /// Send one ICMP echo; `true` if the host replied
    async fn ping(&self, ip: Ipv4Addr) -> Result<bool>;

    /// Attempt a TCP connect; `true` if the port accepted
    async fn connect(&self, ip: Ipv4Addr, port: u16) -> Result<bool>;

    /// Look the host up in the local neighbor (ARP) table
    async fn neighbor_mac(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>>;

    /// Reverse-DNS name for the host
    async fn reverse_dns(&self, ip: Ipv4Addr) -> Result<Option<String>>;
}

/// Per-operation timeouts for [`SystemProber`]
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    pub ping: Duration,
    pub connect: Duration,
    pub dns: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            ping: Duration::from_millis(1000),
            connect: Duration::from_millis(100),
            dns: Duration::from_millis(2000),
        }
    }
}

/// OS command lines for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    platform: Platform,
}

impl CommandSet {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Arguments for a single-echo `ping`
    pub fn ping_args(&self, ip: Ipv4Addr, wait: Duration) -> Vec<String> {
        match self.platform {
            Platform::Windows => vec![
                "-n".into(),
                "1".into(),
                "-w".into(),
                wait.as_millis().max(1).to_string(),
                ip.to_string(),
            ],
            Platform::Posix => vec![
                "-c".into(),
                "1".into(),
                "-W".into(),
                wait.as_secs().max(1).to_string(),
                ip.to_string(),
            ],
        }
    }

    /// Arguments for an `arp` query of one address
    pub fn arp_args(&self, ip: Ipv4Addr) -> Vec<String> {
        match self.platform {
            Platform::Windows => vec!["-a".into(), ip.to_string()],
            Platform::Posix => vec!["-n".into(), ip.to_string()],
        }
    }
}

/// [`Prober`] backed by OS tools and real sockets
#[derive(Debug, Clone)]
pub struct SystemProber {
    commands: CommandSet,
    timeouts: ProbeTimeouts,
}

impl SystemProber {
    pub fn new(platform: Platform, timeouts: ProbeTimeouts) -> Self {
        Self {
            commands: CommandSet::new(platform),
            timeouts,
        }
    }

    async fn command_output(program: &str, args: &[String]) -> std::io::Result<String> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn ping(&self, ip: Ipv4Addr) -> Result<bool> {
        let args = self.commands.ping_args(ip, self.timeouts.ping);
        let child = Command::new("ping")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(self.timeouts.ping + PROCESS_GRACE, child).await {
            Ok(status) => Ok(status?.success()),
            Err(_) => {
                trace!(ip = %ip, "Ping process timed out");
                Ok(false)
            }
        }
    }

    async fn connect(&self, ip: Ipv4Addr, port: u16) -> Result<bool> {
        match timeout(self.timeouts.connect, TcpStream::connect((ip, port))).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) => {
                trace!(ip = %ip, port, error = %e, "Connect refused");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    async fn neighbor_mac(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>> {
        let output = match Self::command_output("arp", &self.commands.arp_args(ip)).await {
            Ok(output) => output,
            // Minimal Linux installs ship iproute2 without net-tools
            Err(e)
                if e.kind() == ErrorKind::NotFound && self.commands.platform == Platform::Posix =>
            {
                let args = vec!["neigh".to_string(), "show".to_string(), ip.to_string()];
                Self::command_output("ip", &args).await?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_mac(&output))
    }

    async fn reverse_dns(&self, ip: Ipv4Addr) -> Result<Option<String>> {
        let addr = IpAddr::V4(ip);
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr));

        match timeout(self.timeouts.dns, lookup).await {
            Ok(joined) => match joined? {
                // getnameinfo falls back to the numeric form when there is no PTR record
                Ok(name) if name != ip.to_string() => Ok(Some(name)),
                Ok(_) => Ok(None),
                Err(e) => {
                    trace!(ip = %ip, error = %e, "Reverse lookup failed");
                    Ok(None)
                }
            },
            Err(_) => {
                trace!(ip = %ip, "Reverse lookup timed out");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_posix_ping_args() {
        let commands = CommandSet::new(Platform::Posix);
        let args = commands.ping_args(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(500));
        assert_eq!(args, vec!["-c", "1", "-W", "1", "10.0.0.1"]);
    }

    #[test]
    fn test_windows_ping_args() {
        let commands = CommandSet::new(Platform::Windows);
        let args = commands.ping_args(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(500));
        assert_eq!(args, vec!["-n", "1", "-w", "500", "10.0.0.1"]);
    }

    #[test]
    fn test_arp_args() {
        let ip = Ipv4Addr::new(192, 168, 1, 4);
        assert_eq!(CommandSet::new(Platform::Posix).arp_args(ip), vec!["-n", "192.168.1.4"]);
        assert_eq!(CommandSet::new(Platform::Windows).arp_args(ip), vec!["-a", "192.168.1.4"]);
    }

    #[tokio::test]
    async fn test_connect_open_and_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();

        let closed_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = closed_listener.local_addr().unwrap().port();
        drop(closed_listener);

        let prober = SystemProber::new(Platform::current(), ProbeTimeouts::default());
        assert!(prober.connect(Ipv4Addr::LOCALHOST, open).await.unwrap());
        assert!(!prober.connect(Ipv4Addr::LOCALHOST, closed).await.unwrap());
    }
}
