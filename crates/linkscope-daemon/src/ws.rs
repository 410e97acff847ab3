//! WebSocket handler for live inventory pushes
//!
//! Clients receive the full device array on connect, on every broadcast
//! tick and whenever they send any text message. Scan lifecycle events
//! are forwarded as tagged messages in between.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use linkscope_discovery::DiscoveryEvent;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Scan lifecycle messages
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum WsMessage {
    ScanStarted { range: String },
    ScanCompleted { found: usize },
    ScanFailed { error: String },
}

impl From<DiscoveryEvent> for WsMessage {
    fn from(event: DiscoveryEvent) -> Self {
        match event {
            DiscoveryEvent::ScanStarted { range } => WsMessage::ScanStarted { range },
            DiscoveryEvent::ScanCompleted { found } => WsMessage::ScanCompleted { found },
            DiscoveryEvent::ScanFailed { error } => WsMessage::ScanFailed { error },
        }
    }
}

type Sender = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Send the current device array; false once the client is gone
async fn push_devices(sender: &mut Sender, state: &AppState) -> bool {
    let devices = state.devices().await;
    match serde_json::to_string(&devices) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize devices");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut discovery_events = state.subscribe();
    let period = Duration::from_secs(state.config.daemon.broadcast_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);

    info!("WebSocket client connected");

    // The first tick completes immediately and covers the push on connect
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !push_devices(&mut sender, &state).await {
                    break;
                }
            }

            event = discovery_events.recv() => {
                match event {
                    Ok(event) => {
                        let msg = WsMessage::from(event);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Discovery event channel lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Discovery event channel closed");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_))) => {
                        if !push_devices(&mut sender, &state).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::router;
    use crate::test_support::state_with;
    use serde_json::Value;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const RANGE: &str = "192.168.1.0/24";

    async fn connect(state: Arc<AppState>) -> Client {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    fn state_pushing_every(secs: u64) -> Arc<AppState> {
        let mut config = Config::default();
        config.daemon.broadcast_interval_secs = secs;
        state_with(config)
    }

    /// Next JSON text frame accepted by `accept`, skipping everything else
    async fn next_json(client: &mut Client, accept: impl Fn(&Value) -> bool) -> Value {
        let wait = async {
            loop {
                let msg = client.next().await.expect("socket open").unwrap();
                if let ClientMessage::Text(text) = msg {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if accept(&value) {
                        return value;
                    }
                }
            }
        };
        timeout(Duration::from_secs(5), wait).await.expect("message in time")
    }

    fn device_count(value: &Value) -> Option<usize> {
        value.as_array().map(Vec::len)
    }

    #[tokio::test]
    async fn test_feed_pushes_on_connect_events_and_request() {
        let state = state_pushing_every(3600);
        let mut client = connect(state.clone()).await;

        // Received only once the handler has subscribed to scan events
        let initial = next_json(&mut client, |v| v.is_array()).await;
        assert_eq!(device_count(&initial), Some(0));

        state.scanner.scan_network(RANGE).await.unwrap();
        let started = next_json(&mut client, |v| v["type"] == "scan_started").await;
        assert_eq!(started["data"]["range"], RANGE);
        let completed = next_json(&mut client, |v| v["type"] == "scan_completed").await;
        assert_eq!(completed["data"]["found"], 2);

        client.send(ClientMessage::text("refresh")).await.unwrap();
        let pushed = next_json(&mut client, |v| v.is_array()).await;
        assert_eq!(device_count(&pushed), Some(2));
        assert_eq!(pushed[0]["ip"], "192.168.1.1");
        assert_eq!(pushed[0]["is_gateway"], true);
    }

    #[tokio::test]
    async fn test_feed_pushes_on_each_tick() {
        let state = state_pushing_every(1);
        let mut client = connect(state.clone()).await;

        let initial = next_json(&mut client, |v| v.is_array()).await;
        assert_eq!(device_count(&initial), Some(0));

        state.scanner.scan_network(RANGE).await.unwrap();
        let ticked = next_json(&mut client, |v| device_count(v) == Some(2)).await;
        assert_eq!(ticked[1]["connected_to"], serde_json::json!(["192.168.1.1"]));
    }

    #[tokio::test]
    async fn test_feed_answers_ping() {
        let state = state_pushing_every(3600);
        let mut client = connect(state).await;
        next_json(&mut client, |v| v.is_array()).await;

        client
            .send(ClientMessage::Ping(vec![7u8].into()))
            .await
            .unwrap();
        let pong = timeout(Duration::from_secs(5), async {
            loop {
                if let ClientMessage::Pong(data) = client.next().await.unwrap().unwrap() {
                    return data;
                }
            }
        })
        .await
        .expect("pong in time");
        assert_eq!(&pong[..], &[7u8][..]);
    }


    #[test]
    fn test_scan_events_are_tagged() {
        let started = WsMessage::from(DiscoveryEvent::ScanStarted {
            range: "10.0.0.0/24".into(),
        });
        assert_eq!(
            serde_json::to_value(&started).unwrap(),
            serde_json::json!({"type": "scan_started", "data": {"range": "10.0.0.0/24"}})
        );

        let done = WsMessage::from(DiscoveryEvent::ScanCompleted { found: 3 });
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            serde_json::json!({"type": "scan_completed", "data": {"found": 3}})
        );

        let failed = WsMessage::from(DiscoveryEvent::ScanFailed {
            error: "bad range".into(),
        });
        assert_eq!(
            serde_json::to_value(&failed).unwrap()["type"],
            "scan_failed"
        );
    }
}
