use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

pub const TEST_SECRET: &str = "relay-test-secret";
pub const TEST_ORIGIN: &str = "http://localhost:5173";

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub fn test_config() -> relay_api::config::Config {
    relay_api::config::Config {
        jwt_secret: TEST_SECRET.to_string(),
        allowed_origins: vec![TEST_ORIGIN.to_string()],
        port: 0,
    }
}

/// Helper: start an actual TCP server for WebSocket testing.
/// Returns (addr, state). The server runs in the background.
pub async fn start_relay_server() -> (SocketAddr, relay_api::AppState) {
    let state = relay_api::AppState::new(test_config());
    let app = relay_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Helper: mint a bearer token the way the REST API does at login.
pub fn mint_token(user_id: &str, user_name: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
        + 3600;
    let claims = relay_api::auth::Claims {
        id: user_id.to_string(),
        name: user_name.to_string(),
        exp,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("encode token")
}

/// Helper: connect to the relay and consume the `connected` handshake event.
/// Returns the stream and the assigned connection id.
pub async fn connect(addr: SocketAddr, token: &str) -> (WsStream, String) {
    let url = format!("ws://{addr}/relay?token={token}");
    let (mut ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let connected = recv_event(&mut ws_stream).await;
    assert_eq!(connected["event"], "connected");
    let connection_id = connected["data"]["connectionId"]
        .as_str()
        .expect("connectionId present")
        .to_string();

    (ws_stream, connection_id)
}

/// Helper: send a named client event.
pub async fn send_event(ws: &mut WsStream, event: &str, data: serde_json::Value) {
    let msg = serde_json::json!({ "event": event, "data": data });
    ws.send(tungstenite::Message::Text(msg.to_string().into()))
        .await
        .expect("send event");
}

/// Helper: read the next text frame as a parsed relay event, with a timeout.
pub async fn recv_event(ws: &mut WsStream) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for relay event")
        .expect("stream ended")
        .expect("ws read error");

    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse relay event")
}

/// Helper: assert no event arrives within the window.
pub async fn assert_silent(ws: &mut WsStream, window: Duration) {
    match time::timeout(window, ws.next()).await {
        Err(_elapsed) => {}
        Ok(Some(Ok(msg))) => panic!("expected silence, got: {msg:?}"),
        Ok(other) => panic!("expected silence, stream ended: {other:?}"),
    }
}

/// Helper: poll until the condition holds (the server processes disconnects
/// asynchronously).
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}
