use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::relay::appstate::RoomMap;
use crate::relay::broadcast::{self, Outbound};
use crate::relay::room::{JoinRequest, ProgressReport, Room};

/// Everything a room can be asked to do.
///
/// Commands are applied one at a time by the room's actor, in the order they
/// were queued.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        connection_id: String,
        outbound: Outbound,
        request: JoinRequest,
    },
    Ready {
        connection_id: String,
        ready: bool,
    },
    Start {
        connection_id: String,
        word_count: Option<u32>,
    },
    Progress {
        connection_id: String,
        report: ProgressReport,
    },
    Reload {
        connection_id: String,
        user_id: String,
    },
    Leave {
        connection_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<Room>,
    },
}

/// Owns one room and the outbound channels of its members.
///
/// Runs as its own task. Once the room has been empty for the grace period
/// the actor removes its entry from the registry and stops.
pub struct RoomActor {
    room: Room,
    members: HashMap<String, Outbound>,
    rooms: RoomMap,
    grace_period: Duration,
    evict_at: Option<Instant>,
    rng: StdRng,
}

impl RoomActor {
    pub fn new(room: Room, rooms: RoomMap, grace_period: Duration) -> RoomActor {
        RoomActor {
            room,
            members: HashMap::new(),
            rooms,
            grace_period,
            evict_at: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub async fn run(mut self, mut commands: UnboundedReceiver<RoomCommand>) {
        info!(room_id = %self.room.room_id(), "room opened");

        loop {
            let deadline = self.evict_at;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.try_evict(&mut commands).await {
                        break;
                    }
                }
            }
        }

        info!(room_id = %self.room.room_id(), "room closed");
    }

    fn apply(&mut self, command: RoomCommand) {
        let now = Utc::now().timestamp_millis();

        let outgoing = match command {
            RoomCommand::Join {
                connection_id,
                outbound,
                request,
            } => {
                let outcome = self.room.join(&connection_id, request);
                if let Some(previous) = outcome.displaced {
                    self.members.remove(&previous);
                }
                info!(
                    room_id = %self.room.room_id(),
                    connection_id = %connection_id,
                    players = self.room.players().len(),
                    "player joined"
                );
                self.members.insert(connection_id, outbound);
                self.evict_at = None;
                outcome.outgoing
            }
            RoomCommand::Ready {
                connection_id,
                ready,
            } => self.room.set_ready(&connection_id, ready, &mut self.rng, now),
            RoomCommand::Start {
                connection_id,
                word_count,
            } => self
                .room
                .force_start(&connection_id, word_count, &mut self.rng, now),
            RoomCommand::Progress {
                connection_id,
                report,
            } => self.room.report_progress(&connection_id, report),
            RoomCommand::Reload {
                connection_id,
                user_id,
            } => self.room.notify_reload(&connection_id, &user_id),
            RoomCommand::Leave { connection_id } => {
                self.members.remove(&connection_id);
                let outgoing = self.room.leave(&connection_id, &mut self.rng, now);
                debug!(
                    room_id = %self.room.room_id(),
                    connection_id = %connection_id,
                    players = self.room.players().len(),
                    "player left"
                );
                if self.room.is_empty() && self.evict_at.is_none() {
                    self.evict_at = Some(Instant::now() + self.grace_period);
                }
                outgoing
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.clone());
                Vec::new()
            }
        };

        for item in &outgoing {
            broadcast::deliver(&self.members, item);
        }
    }

    // Runs under the registry's write lock, so no command can be queued
    // between the final check and the removal of the entry.
    async fn try_evict(&mut self, commands: &mut UnboundedReceiver<RoomCommand>) -> bool {
        let rooms = self.rooms.clone();
        let mut rooms = rooms.write().await;

        while let Ok(command) = commands.try_recv() {
            self.apply(command);
        }
        if !self.room.is_empty() {
            self.evict_at = None;
            return false;
        }

        rooms.remove(self.room.room_id());
        commands.close();
        true
    }
}
