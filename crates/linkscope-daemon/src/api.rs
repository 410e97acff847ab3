//! REST API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use linkscope_discovery::{ScanError, ScanOutcome, ScanRange, ScanSummary};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// List all discovered devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.devices().await)
}

/// Get one device by IP
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    let Ok(ip) = ip.parse::<Ipv4Addr>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(format!("Invalid IPv4 address: {}", ip))),
        )
            .into_response();
    };

    match state.scanner.get_device(ip).await {
        Some(device) => Json(device).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(format!("Device not found: {}", ip))),
        )
            .into_response(),
    }
}

/// Get the estimated topology
pub async fn get_topology(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.topology().await)
}

#[derive(Deserialize)]
pub struct ScanParams {
    ip_range: Option<String>,
}

/// Run a scan now and report how it went
pub async fn trigger_scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanParams>,
) -> impl IntoResponse {
    let ip_range = params
        .ip_range
        .unwrap_or_else(|| state.config.discovery.ip_range.clone());
    info!(range = %ip_range, "Manual scan triggered");

    match state.scanner.scan_network(&ip_range).await {
        Ok(ScanOutcome::Completed { found }) => Json(serde_json::json!({
            "status": "scan_completed",
            "devices_found": found
        }))
        .into_response(),
        Ok(ScanOutcome::Skipped) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "scan_in_progress"})),
        )
            .into_response(),
        Err(e @ ScanError::InvalidRange(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Scan failed: {}", e))),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct StatusResponse {
    scanning: bool,
    gateway_ip: Option<Ipv4Addr>,
    compat_layer: bool,
    last_scan: Option<ScanSummary>,
}

/// Scanner state and environment
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let environment = state.scanner.environment();
    Json(StatusResponse {
        scanning: state.scanner.is_scanning(),
        gateway_ip: environment.gateway_ip,
        compat_layer: environment.is_compat_layer,
        last_scan: state.scanner.last_scan().await,
    })
}

/// Interface name prefixes of container and VM bridges, never scan targets
const VIRTUAL_PREFIXES: &[&str] = &["docker", "br-", "veth", "virbr"];

/// A local interface the dashboard can offer as a scan target
#[derive(Serialize)]
pub struct ScanTarget {
    pub interface: String,
    pub address: Ipv4Addr,
    /// Value to post back as `ip_range` to `/api/scan`
    pub scan_range: String,
}

fn scan_target(name: &str, addr: &network_interface::Addr) -> Option<ScanTarget> {
    let network_interface::Addr::V4(v4) = addr else {
        return None;
    };
    if v4.ip.is_loopback() || VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return None;
    }

    let cidr = v4.netmask.map_or(24, |mask| u32::from(mask).leading_ones() as u8);
    Some(ScanTarget {
        interface: name.to_string(),
        address: v4.ip,
        scan_range: ScanRange::around(v4.ip, cidr).to_string(),
    })
}

/// List local IPv4 interfaces with the scan range each one sits in
pub async fn list_interfaces() -> impl IntoResponse {
    use network_interface::{NetworkInterface, NetworkInterfaceConfig};

    let interfaces = match NetworkInterface::show() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate network interfaces");
            Vec::new()
        }
    };

    let targets: Vec<ScanTarget> = interfaces
        .iter()
        .filter_map(|iface| {
            iface
                .addr
                .iter()
                .find_map(|addr| scan_target(&iface.name, addr))
        })
        .collect();

    Json(targets)
}
