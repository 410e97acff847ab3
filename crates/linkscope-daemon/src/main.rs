//! LinkScope Daemon - Main entry point
//!
//! Runs periodic LAN discovery and serves the inventory over HTTP and WebSocket.

mod api;
mod config;
mod server;
mod state;
#[cfg(test)]
mod test_support;
mod ws;

use anyhow::Result;
use clap::Parser;
use linkscope_discovery::DiscoveryScanner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "linkscope")]
#[command(about = "LAN device discovery and topology daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "linkscope.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Range to scan, e.g. 192.168.1.0/24
    #[arg(short, long)]
    range: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("LinkScope v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(range) = args.range {
        config.discovery.ip_range = range;
    }

    info!(
        range = %config.discovery.ip_range,
        interval_secs = config.discovery.interval_secs,
        "Configuration loaded"
    );

    let scanner = Arc::new(DiscoveryScanner::new(config.discovery.clone()).await);

    if args.scan_once {
        info!("Running single discovery scan");
        scanner.scan_network(&config.discovery.ip_range).await?;
        let devices = scanner.devices().await;
        println!("Discovered {} devices:", devices.len());
        for device in devices {
            let role = if device.is_gateway { " [gateway]" } else { "" };
            println!("  - {} ({}){}", device.ip, device.mac, role);
            if let Some(hostname) = &device.hostname {
                println!("    Hostname: {}", hostname);
            }
            if let Some(manufacturer) = &device.manufacturer {
                println!("    Manufacturer: {}", manufacturer);
            }
        }
        return Ok(());
    }

    let ctrl_c_scanner = scanner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            ctrl_c_scanner.shutdown();
        }
    });

    let state = state::AppState::new(config.clone(), scanner);
    server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await
}
