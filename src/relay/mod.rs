pub mod actor;
pub mod appstate;
pub mod broadcast;
pub mod client;
pub mod room;
pub mod server;

use serde::{Deserialize, Deserializer, Serialize};

use crate::relay::room::{Mode, Room};

/// This enum is used to represent the different types of requests that a client
/// can send to the server.
///
/// Every request names the room it targets. The requests that a client can
/// send are:
///
/// * Join: join a room, creating it if nobody has joined it yet.
/// * Ready: toggle readiness while the room is still forming.
/// * Start: host-initiated start, skipping the ready barrier.
/// * Progress: report how far the player got in the quiz.
/// * PageReloaded: tell the rest of the room that this tab was reloaded.
/// * Leave: leave the room without closing the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestPacket {
    #[serde(rename = "mp:join", rename_all = "camelCase")]
    Join {
        room_id: String,
        #[serde(deserialize_with = "string_or_number")]
        user_id: String,
        email: String,
        dictionary_id: i64,
        mode: Mode,
        // A candidate shuffle. Only its length is ever used by the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        word_order: Option<Vec<u32>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        word_count: Option<u32>,
    },
    #[serde(rename = "mp:ready", rename_all = "camelCase")]
    Ready { room_id: String, ready: bool },
    #[serde(rename = "mp:start", rename_all = "camelCase")]
    Start {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        word_order: Option<Vec<u32>>,
    },
    #[serde(rename = "mp:progress", rename_all = "camelCase")]
    Progress {
        room_id: String,
        progress_index: u32,
        correct_count: u32,
        #[serde(default)]
        finished: bool,
    },
    #[serde(rename = "mp:pageReloaded", rename_all = "camelCase")]
    PageReloaded {
        room_id: String,
        #[serde(deserialize_with = "string_or_number")]
        user_id: String,
        email: String,
    },
    #[serde(rename = "mp:leave", rename_all = "camelCase")]
    Leave { room_id: String },
}

/// This enum is used to represent the different types of events that the
/// server sends to room members.
///
/// * Connected: sent once per connection, carries the assigned connection id.
/// * State: the full room snapshot after any mutation.
/// * Started: the one-time start signal with the authoritative word order.
/// * Winner: the one-time winner signal.
/// * PageReloaded: a relayed reload notice, tagged with the room's progress
///   so clients can decide whether to reset without fetching state.
/// * Error: a request from this connection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsePacket {
    #[serde(rename = "mp:connected", rename_all = "camelCase")]
    Connected { connection_id: String },
    #[serde(rename = "mp:state")]
    State(Room),
    #[serde(rename = "mp:started", rename_all = "camelCase")]
    Started {
        room_id: String,
        started_at: i64,
        word_order: Vec<u32>,
    },
    #[serde(rename = "mp:winner", rename_all = "camelCase")]
    Winner {
        room_id: String,
        connection_id: String,
        user_id: String,
    },
    #[serde(rename = "mp:pageReloaded", rename_all = "camelCase")]
    PageReloaded {
        connection_id: String,
        user_id: String,
        email: String,
        started_at: Option<i64>,
        player_count: usize,
    },
    #[serde(rename = "mp:error")]
    Error { message: String },
}

// User ids come from the surrounding application, which may send them as
// numbers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Number(value) => value.to_string(),
    })
}
