//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use talents_common::id::{prefix, prefixed_ulid};

use crate::auth;
use crate::AppState;

use super::events::{
    ClientMessage, EventName, JoinSessionPayload, RelayMessage, SendMessagePayload,
    SessionCreatedPayload, TypingPayload, EVENT_JOIN_SESSION, EVENT_LEAVE_SESSION,
    EVENT_SEND_MESSAGE, EVENT_SESSION_CREATED, EVENT_TYPING,
};
use super::fanout::BroadcastPayload;
use super::service::RelayService;

/// Close codes (4000-range for application-level).
const CLOSE_NOT_AUTHENTICATED: u16 = 4003;
const CLOSE_AUTH_FAILED: u16 = 4004;

pub fn router() -> Router<AppState> {
    Router::new().route("/relay", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    // Browsers declare an Origin on WebSocket handshakes; refuse the upgrade
    // outright when it is not on the allow-list, mirroring the REST CORS
    // policy. Non-browser clients send no Origin and pass through.
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !state.config.allows_origin(origin) {
            tracing::debug!(%origin, "relay connection refused: origin not allowed");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_connection(socket, state, params.token))
        .into_response()
}

async fn handle_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_tx, ws_rx) = socket.split();

    let claims = match token.as_deref() {
        None => {
            let _ = send_close(&mut ws_tx, CLOSE_NOT_AUTHENTICATED, "Missing token").await;
            return;
        }
        Some(token) => match auth::verify_token(&state.config.jwt_secret, token) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::debug!(%reason, "relay handshake failed");
                let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, reason).await;
                return;
            }
        },
    };

    let connection_id = prefixed_ulid(prefix::CONNECTION);

    // Subscribe before registering so no dispatch can slip past this
    // connection between the two steps.
    let broadcast_rx = state.relay.subscribe();
    state.relay.connect(&connection_id, &claims.id, &claims.name);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %claims.id,
        "relay connection established"
    );

    let connected = RelayMessage::new(
        EventName::CONNECTED,
        serde_json::json!({
            "connectionId": connection_id,
            "userId": claims.id,
            "userName": claims.name,
        }),
    );
    let json = serde_json::to_string(&connected).unwrap();
    if ws_tx.send(Message::Text(json.into())).await.is_err() {
        state.relay.disconnect(&connection_id);
        return;
    }

    run_connection(&connection_id, &state.relay, ws_tx, ws_rx, broadcast_rx).await;

    // Transport-level disconnect is an implicit leave.
    state.relay.disconnect(&connection_id);

    tracing::info!(connection_id = %connection_id, "relay connection closed");
}

/// Main connection loop: pump client events into the relay service and
/// addressed broadcast payloads out to the socket.
async fn run_connection(
    connection_id: &str,
    relay: &RelayService,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<Arc<BroadcastPayload>>,
) {
    loop {
        tokio::select! {
            // Client sends us an event.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Malformed events are dropped, never fatal: one bad
                        // client must not disturb the rest of the room.
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_client_event(connection_id, relay, client_msg),
                            Err(err) => {
                                tracing::debug!(
                                    ?err,
                                    connection_id = %connection_id,
                                    "dropping malformed relay event"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, connection_id = %connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Addressed payload from the broadcast hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        if !payload.audience.includes(connection_id) {
                            continue;
                        }

                        let msg = RelayMessage::new(&payload.event, payload.data.clone());
                        let json = serde_json::to_string(&msg).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            skipped,
                            "relay connection lagged behind broadcast"
                        );
                        // Keep going; delivery is best-effort.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Dispatch one client event into the relay service. Unknown events and
/// malformed payloads are dropped with a debug log.
fn handle_client_event(connection_id: &str, relay: &RelayService, msg: ClientMessage) {
    match msg.event.as_str() {
        EVENT_JOIN_SESSION => match serde_json::from_value::<JoinSessionPayload>(msg.data) {
            Ok(payload) => relay.join(connection_id, &payload.session_id),
            Err(err) => drop_malformed(connection_id, EVENT_JOIN_SESSION, err),
        },
        EVENT_LEAVE_SESSION => relay.leave(connection_id),
        EVENT_SEND_MESSAGE => match serde_json::from_value::<SendMessagePayload>(msg.data) {
            Ok(payload) => relay.send_message(connection_id, &payload.content),
            Err(err) => drop_malformed(connection_id, EVENT_SEND_MESSAGE, err),
        },
        EVENT_TYPING => match serde_json::from_value::<TypingPayload>(msg.data) {
            Ok(payload) => relay.set_typing(connection_id, payload.is_typing),
            Err(err) => drop_malformed(connection_id, EVENT_TYPING, err),
        },
        EVENT_SESSION_CREATED => match serde_json::from_value::<SessionCreatedPayload>(msg.data) {
            Ok(payload) => relay.announce_session_created(connection_id, payload.session),
            Err(err) => drop_malformed(connection_id, EVENT_SESSION_CREATED, err),
        },
        other => {
            tracing::debug!(
                event = %other,
                connection_id = %connection_id,
                "ignoring unknown relay event"
            );
        }
    }
}

fn drop_malformed(connection_id: &str, event: &str, err: serde_json::Error) {
    tracing::debug!(
        ?err,
        event = %event,
        connection_id = %connection_id,
        "dropping relay event with malformed payload"
    );
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
