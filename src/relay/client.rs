use axum::extract::ws::Message;
use std::collections::HashSet;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::relay::actor::RoomCommand;
use crate::relay::appstate::AppState;
use crate::relay::broadcast::{self, Outbound};
use crate::relay::room::{JoinRequest, ProgressReport};
use crate::relay::{RequestPacket, ResponsePacket};

/// This struct represents a single client connection to the server.
///
/// A `Client` owns the connection id handed out on connect, the outbound
/// channel feeding the socket writer and the set of rooms the connection has
/// joined. The room set is what gets cleaned up when the socket goes away.
#[derive(Debug)]
pub struct Client {
    connection_id: String,
    outbound: Outbound,
    rooms: HashSet<String>,
}

impl Client {
    /// Creates a new `Client` with a fresh connection id.
    ///
    /// The client is not in any room when it first connects.
    pub fn new(outbound: Outbound) -> Client {
        Client {
            connection_id: Uuid::new_v4().to_string(),
            outbound,
            rooms: HashSet::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn rooms(&self) -> &HashSet<String> {
        &self.rooms
    }

    fn send_packet(&self, packet: ResponsePacket) {
        if !broadcast::send_packet(&self.outbound, &packet) {
            debug!(connection_id = %self.connection_id, "connection closed before delivery");
        }
    }

    fn send_error_packet(&self, message: String) {
        self.send_packet(ResponsePacket::Error { message })
    }

    /// Tells the client which connection id it was given.
    pub fn greet(&self) {
        self.send_packet(ResponsePacket::Connected {
            connection_id: self.connection_id.clone(),
        })
    }

    fn ensure_member(&self, room_id: &str) -> Result<(), RelayError> {
        if self.rooms.contains(room_id) {
            Ok(())
        } else {
            Err(RelayError::NotAMember(room_id.to_string()))
        }
    }

    async fn handle_packet(&mut self, state: &AppState, packet: RequestPacket) -> Result<(), RelayError> {
        let connection_id = self.connection_id.clone();

        match packet {
            RequestPacket::Join {
                room_id,
                user_id,
                email,
                dictionary_id,
                mode,
                word_order,
                word_count,
            } => {
                let request = JoinRequest {
                    user_id,
                    display_label: email,
                    dictionary_id,
                    mode,
                    word_count,
                    word_order_hint: word_order,
                };
                state
                    .join(&room_id, connection_id, self.outbound.clone(), request)
                    .await;
                self.rooms.insert(room_id);
                Ok(())
            }
            RequestPacket::Ready { room_id, ready } => {
                self.ensure_member(&room_id)?;
                state
                    .dispatch(&room_id, RoomCommand::Ready { connection_id, ready })
                    .await
            }
            RequestPacket::Start {
                room_id,
                word_order,
            } => {
                self.ensure_member(&room_id)?;
                let word_count = word_order.and_then(|order| u32::try_from(order.len()).ok());
                state
                    .dispatch(
                        &room_id,
                        RoomCommand::Start {
                            connection_id,
                            word_count,
                        },
                    )
                    .await
            }
            RequestPacket::Progress {
                room_id,
                progress_index,
                correct_count,
                finished,
            } => {
                self.ensure_member(&room_id)?;
                let report = ProgressReport {
                    progress_index,
                    correct_count,
                    finished,
                };
                state
                    .dispatch(&room_id, RoomCommand::Progress { connection_id, report })
                    .await
            }
            // A reloaded tab announces itself before it has rejoined, so
            // membership is not required here. The room checks the claimed
            // user against its seats and relays the seat's own label.
            RequestPacket::PageReloaded { room_id, user_id, .. } => {
                state
                    .dispatch(
                        &room_id,
                        RoomCommand::Reload {
                            connection_id,
                            user_id,
                        },
                    )
                    .await
            }
            RequestPacket::Leave { room_id } => {
                self.ensure_member(&room_id)?;
                self.rooms.remove(&room_id);
                state
                    .dispatch(&room_id, RoomCommand::Leave { connection_id })
                    .await
            }
        }
    }

    /// This function handles an incoming message from a client.
    ///
    /// Text frames are parsed as a `RequestPacket`. A frame that does not
    /// parse is answered with an error packet and otherwise ignored; the
    /// connection stays open. Requests the rooms refuse are only logged.
    ///
    /// Binary frames are not part of the protocol. Ping and pong frames are
    /// answered by axum. A close frame leaves every joined room.
    pub async fn handle_message(&mut self, state: &AppState, message: Message) {
        match message {
            Message::Text(text) => {
                let packet = match serde_json::from_str::<RequestPacket>(&text) {
                    Ok(packet) => packet,
                    Err(error) => {
                        let error = RelayError::MalformedPayload(error.to_string());
                        warn!(connection_id = %self.connection_id, "{}", error);
                        return self.send_error_packet(error.to_string());
                    }
                };
                trace!(connection_id = %self.connection_id, ?packet, "request received");

                if let Err(error) = self.handle_packet(state, packet).await {
                    debug!(connection_id = %self.connection_id, "request ignored: {}", error);
                }
            }
            Message::Binary(_) => {
                self.send_error_packet("binary frames are not supported".to_string());
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!(connection_id = %self.connection_id, "keepalive");
            }
            Message::Close(_) => {
                debug!(connection_id = %self.connection_id, "client sent close frame");
                self.handle_close(state).await;
            }
        }
    }

    /// Leaves every room this connection joined.
    pub async fn handle_close(&mut self, state: &AppState) {
        for room_id in std::mem::take(&mut self.rooms) {
            let command = RoomCommand::Leave {
                connection_id: self.connection_id.clone(),
            };
            if let Err(error) = state.dispatch(&room_id, command).await {
                debug!(connection_id = %self.connection_id, "leave skipped: {}", error);
            }
        }
    }
}
