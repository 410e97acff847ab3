//! Host environment detection: OS family, compatibility layer, default gateway

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Kernel version marker carrying the compatibility-layer vendor signature
const KERNEL_VERSION_PATH: &str = "/proc/version";
const COMPAT_SIGNATURE: &str = "microsoft";

/// OS family, decides the command/flag syntax used for probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Facts about the machine the engine runs on, gathered once at start-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub platform: Platform,
    /// Running under a WSL-like compatibility subsystem
    pub is_compat_layer: bool,
    /// Default gateway, if it could be determined
    pub gateway_ip: Option<Ipv4Addr>,
}

/// Detect platform, compatibility layer and default gateway. Never fails;
/// detection problems degrade to "native OS" and "gateway unknown".
pub async fn detect_environment() -> Environment {
    let environment = Environment {
        platform: Platform::current(),
        is_compat_layer: detect_compat_layer().await,
        gateway_ip: detect_gateway().await,
    };

    info!(
        platform = ?environment.platform,
        compat_layer = environment.is_compat_layer,
        gateway = ?environment.gateway_ip,
        "Environment detected"
    );
    environment
}

async fn detect_compat_layer() -> bool {
    match tokio::fs::read_to_string(KERNEL_VERSION_PATH).await {
        Ok(content) => is_compat_marker(&content),
        Err(e) => {
            debug!(path = KERNEL_VERSION_PATH, error = %e, "Kernel version marker unreadable");
            false
        }
    }
}

/// True if a kernel version string carries the compatibility-layer signature
pub fn is_compat_marker(version: &str) -> bool {
    version.to_lowercase().contains(COMPAT_SIGNATURE)
}

/// Query the routing table (POSIX `ip route`), then Windows `ipconfig`
async fn detect_gateway() -> Option<Ipv4Addr> {
    match run_command("ip", &["route", "show", "default"]).await {
        Ok(output) => {
            if let Some(gateway) = parse_route_gateway(&output) {
                return Some(gateway);
            }
            debug!("No default route in routing table");
        }
        Err(e) => debug!(error = %e, "Routing table query failed"),
    }

    match run_command("ipconfig", &[]).await {
        Ok(output) => {
            if let Some(gateway) = parse_ipconfig_gateway(&output) {
                return Some(gateway);
            }
        }
        Err(e) => debug!(error = %e, "ipconfig query failed"),
    }

    warn!("Failed to determine default gateway");
    None
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ipv4_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap())
}

fn default_via_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"default via (\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap()
    })
}

/// Gateway from `ip route` output
pub fn parse_route_gateway(output: &str) -> Option<Ipv4Addr> {
    default_via_pattern()
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
}

/// Gateway from `ipconfig` output.
///
/// The "Default Gateway" line may list an IPv6 address first with the IPv4
/// address on the indented line that follows, so that line is checked too.
pub fn parse_ipconfig_gateway(output: &str) -> Option<Ipv4Addr> {
    let mut lines = output.lines().peekable();
    while let Some(line) = lines.next() {
        if !line.contains("Default Gateway") {
            continue;
        }

        let found = first_ipv4(line).or_else(|| {
            lines
                .peek()
                .filter(|next| !next.contains(':'))
                .and_then(|next| first_ipv4(next))
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

fn first_ipv4(text: &str) -> Option<Ipv4Addr> {
    ipv4_pattern()
        .captures_iter(text)
        .find_map(|caps| caps[1].parse().ok())
}
