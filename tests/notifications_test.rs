//! End-to-end tests for the notifications manager against a local
//! WebSocket server and a mock identity provider.
//!
//! Timing-sensitive (the reconnect path sleeps through real backoff), so
//! these run serialized. The deterministic dispatch properties live in
//! the manager's unit tests; this file proves the full pipe: login,
//! handshake with the embedded token, frame to snapshot to listener,
//! disconnect to unavailability, stop semantics.

use std::sync::Arc;
use std::time::Duration;

use fresco_bridge::auth::TokenManager;
use fresco_bridge::config::BridgeConfig;
use fresco_bridge::notifications::{DeviceSnapshot, NotificationsManager};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use serial_test::serial;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn config_for(auth_uri: &str, ws_url: &str) -> BridgeConfig {
    BridgeConfig {
        username: "cook@example.com".to_string(),
        password: "hunter2".to_string(),
        client_id: "client-abc".to_string(),
        region: "us-east-2".to_string(),
        device_id: "device-1".to_string(),
        module_idx: 0,
        model_id: "kitchenos:InstantBrands:InstantPotProPlus".to_string(),
        api_base: "http://127.0.0.1:1".to_string(),
        auth_endpoint: Some(format!("{}/auth", auth_uri)),
        notifications_url: ws_url.to_string(),
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {
                "AccessToken": "access-1",
                "IdToken": "id-1",
                "RefreshToken": "refresh-1",
                "ExpiresIn": 3600,
                "TokenType": "Bearer",
            }
        })))
        .mount(server)
        .await;
}

fn state_frame(device_id: &str, device_state: &str) -> String {
    json!({
        "device_id": device_id,
        "device_state": device_state,
        "capability": {
            "name": "PressureCook",
            "text": "Cooking",
            "progress": 42.5,
            "type": "kitchenos:CapabilityType:Cooking",
        },
    })
    .to_string()
}

async fn wait_until<F: Fn() -> bool>(deadline: Duration, predicate: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
#[serial]
async fn test_frames_flow_to_listener_and_disconnect_marks_unavailable() {
    init_tracing();
    let auth = MockServer::start().await;
    mount_login(&auth).await;

    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

    // One accepted connection; frames come from the test through the
    // channel, and dropping the sender closes the connection.
    let server = tokio::spawn(async move {
        let (stream, _) = socket.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(frame) = frame_rx.recv().await {
            if ws.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws.close(None).await;
    });

    let config = config_for(&auth.uri(), &format!("ws://{}/ws", addr));
    let tokens = Arc::new(TokenManager::new(&config));
    let manager = NotificationsManager::new(&config, tokens);

    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<DeviceSnapshot>();
    let _remove = manager.add_listener("dev-1", move |snapshot| {
        let _ = snapshot_tx.send(snapshot.clone());
    });

    manager.start();

    frame_tx
        .send(state_frame("dev-1", "kitchenos:DeviceState:Running"))
        .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(10), snapshot_rx.recv())
        .await
        .expect("timed out waiting for snapshot")
        .unwrap();
    assert_eq!(
        snapshot.device_state.as_deref(),
        Some("kitchenos:DeviceState:Running")
    );
    assert_eq!(
        snapshot.capability.as_ref().unwrap().name.as_deref(),
        Some("PressureCook")
    );

    // The stored state matches what the listener saw.
    assert_eq!(manager.get_state("dev-1"), Some(snapshot));
    assert!(manager.is_available("dev-1"));
    // Never-observed device: optimistic while the loop runs.
    assert!(manager.is_available("never-seen"));

    // Close the connection; the device must go unavailable and its
    // listener must be notified once more.
    drop(frame_tx);
    let second = tokio::time::timeout(Duration::from_secs(10), snapshot_rx.recv())
        .await
        .expect("timed out waiting for unavailability dispatch")
        .unwrap();
    assert_eq!(
        second.device_state.as_deref(),
        Some("kitchenos:DeviceState:Running")
    );
    assert!(!manager.is_available("dev-1"));

    manager.stop().await;
    assert!(!manager.is_available("never-seen"));

    server.abort();
}

#[tokio::test]
#[serial]
async fn test_reconnects_after_server_closes() {
    init_tracing();
    let auth = MockServer::start().await;
    mount_login(&auth).await;

    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    // First connection is closed immediately; the second delivers a frame
    // and stays open until the client goes away.
    let server = tokio::spawn(async move {
        let (stream, _) = socket.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;

        let (stream, _) = socket.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(state_frame(
            "dev-1",
            "kitchenos:DeviceState:Idle",
        )))
        .await
        .unwrap();
        while let Some(frame) = ws.next().await {
            if frame.is_err() {
                break;
            }
        }
    });

    let config = config_for(&auth.uri(), &format!("ws://{}/ws", addr));
    let tokens = Arc::new(TokenManager::new(&config));
    let manager = NotificationsManager::new(&config, tokens);

    manager.start();

    // Survives the first closed connection and picks the frame up on the
    // reconnect, one backoff unit later.
    let arrived = wait_until(Duration::from_secs(15), || {
        manager.get_state("dev-1").is_some()
    })
    .await;
    assert!(arrived, "state never arrived after reconnect");
    assert!(manager.is_available("dev-1"));

    manager.stop().await;
    server.abort();
}

#[tokio::test]
#[serial]
async fn test_stop_is_idempotent_and_safe_before_start() {
    init_tracing();
    let auth = MockServer::start().await;
    let config = config_for(&auth.uri(), "ws://127.0.0.1:1/ws");
    let tokens = Arc::new(TokenManager::new(&config));
    let manager = NotificationsManager::new(&config, tokens);

    // Not running: never-seen devices read unavailable.
    assert!(!manager.is_available("dev-1"));

    manager.stop().await;
    manager.start();
    manager.stop().await;
    manager.stop().await;

    assert!(!manager.is_available("dev-1"));
}
