//! Relay event names, payload types, and wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client → server event names
// ---------------------------------------------------------------------------

pub const EVENT_JOIN_SESSION: &str = "join-session";
pub const EVENT_LEAVE_SESSION: &str = "leave-session";
pub const EVENT_SEND_MESSAGE: &str = "send-message";
pub const EVENT_TYPING: &str = "typing";
pub const EVENT_SESSION_CREATED: &str = "session-created";

// ---------------------------------------------------------------------------
// Server → client message
// ---------------------------------------------------------------------------

/// A named event sent from the relay to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct RelayMessage {
    pub event: String,
    pub data: Value,
}

impl RelayMessage {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// join-session payload
// ---------------------------------------------------------------------------

/// Identity fields sent by legacy clients alongside `sessionId` are ignored;
/// identity comes from the authenticated handshake.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionPayload {
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// send-message payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub content: String,
}

// ---------------------------------------------------------------------------
// typing payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub is_typing: bool,
}

// ---------------------------------------------------------------------------
// session-created payload
// ---------------------------------------------------------------------------

/// The session object is passed through verbatim to calendar listeners; the
/// relay does not interpret it.
#[derive(Debug, Deserialize)]
pub struct SessionCreatedPayload {
    pub session: Value,
}

// ---------------------------------------------------------------------------
// Server → client event names
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const USER_JOINED: &'static str = "user-joined";
    pub const USER_LEFT: &'static str = "user-left";
    pub const USER_TYPING: &'static str = "user-typing";
    pub const RECEIVE_MESSAGE: &'static str = "receive-message";
    pub const CALENDAR_UPDATED: &'static str = "calendar-updated";
}
