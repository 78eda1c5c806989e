use axum::extract::ws::Message;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use crate::error::RelayError;
use crate::relay::room::Outgoing;
use crate::relay::ResponsePacket;

/// The outbound half of a connection.
///
/// Messages pushed here are written to the socket by the connection's writer
/// task, so sending never waits on the network.
pub type Outbound = UnboundedSender<Message>;

/// Serializes a packet into a websocket text frame.
pub fn encode(packet: &ResponsePacket) -> Result<Message, RelayError> {
    Ok(Message::Text(serde_json::to_string(packet)?))
}

/// Sends a packet to a single connection. Returns whether it was queued.
pub fn send_packet(outbound: &Outbound, packet: &ResponsePacket) -> bool {
    match encode(packet) {
        Ok(message) => outbound.send(message).is_ok(),
        Err(error) => {
            error!("Failed to encode packet: {}", error);
            false
        }
    }
}

/// Fans a packet out to the members of a room.
///
/// The packet is encoded once. A member whose connection already went away
/// is skipped without affecting delivery to the others. Returns the number
/// of members the packet was queued for.
pub fn deliver(members: &HashMap<String, Outbound>, outgoing: &Outgoing) -> usize {
    let message = match encode(&outgoing.packet) {
        Ok(message) => message,
        Err(error) => {
            error!("Failed to encode packet: {}", error);
            return 0;
        }
    };

    let mut delivered = 0;
    for (connection_id, outbound) in members {
        if outgoing.skip.as_deref() == Some(connection_id.as_str()) {
            continue;
        }
        if outbound.send(message.clone()).is_err() {
            debug!(connection_id = %connection_id, "connection closed before delivery");
            continue;
        }
        delivered += 1;
    }
    delivered
}
