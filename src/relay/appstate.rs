use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, warn};

use crate::error::RelayError;
use crate::relay::actor::{RoomActor, RoomCommand};
use crate::relay::broadcast::Outbound;
use crate::relay::room::{JoinRequest, Room};

/// Handle to a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
}

/// Room id to room actor. Commands are only ever queued while holding the
/// read lock; an actor removes its own entry while holding the write lock.
pub type RoomMap = Arc<RwLock<HashMap<String, RoomHandle>>>;

/// The registry of every room the server knows about.
///
/// Cloning is cheap, all clones share the same rooms. The lock only guards
/// the id to handle map: room state lives inside each room's actor, so
/// traffic in one room never waits on another.
#[derive(Debug, Clone)]
pub struct AppState {
    rooms: RoomMap,
    grace_period: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// How long an empty room is kept around so a reloading tab can rejoin it.
    pub const ROOM_GRACE_PERIOD: Duration = Duration::from_secs(10);

    pub fn new() -> AppState {
        Self::with_grace_period(Self::ROOM_GRACE_PERIOD)
    }

    pub fn with_grace_period(grace_period: Duration) -> AppState {
        AppState {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Joins a connection to a room, spawning the room's actor if the room
    /// does not exist yet.
    pub async fn join(
        &self,
        room_id: &str,
        connection_id: String,
        outbound: Outbound,
        request: JoinRequest,
    ) {
        let (dictionary_id, mode) = (request.dictionary_id, request.mode);
        let mut command = RoomCommand::Join {
            connection_id,
            outbound,
            request,
        };

        {
            let rooms = self.rooms.read().await;
            if let Some(handle) = rooms.get(room_id) {
                match handle.commands.send(command) {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(returned)) => command = returned,
                }
            }
        }

        let mut rooms = self.rooms.write().await;

        // Someone else may have created the room while the lock was released.
        if let Some(handle) = rooms.get(room_id) {
            match handle.commands.send(command) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    warn!(room_id, "replacing a room whose actor has stopped");
                    command = returned;
                }
            }
        }

        let room = Room::new(room_id.to_string(), dictionary_id, mode);
        let handle = self.spawn_room(room);
        if handle.commands.send(command).is_err() {
            error!(room_id, "room actor stopped before its first join");
            return;
        }
        rooms.insert(room_id.to_string(), handle);
        debug!(room_id, rooms = rooms.len(), "room created");
    }

    fn spawn_room(&self, room: Room) -> RoomHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = RoomActor::new(room, self.rooms.clone(), self.grace_period);
        tokio::spawn(actor.run(receiver));

        RoomHandle { commands }
    }

    /// Queues a command for an existing room.
    ///
    /// Rooms are only ever created by a join, so any other command aimed at
    /// an unknown room fails with `UnknownRoom`.
    pub async fn dispatch(&self, room_id: &str, command: RoomCommand) -> Result<(), RelayError> {
        let rooms = self.rooms.read().await;
        let handle = rooms
            .get(room_id)
            .ok_or_else(|| RelayError::UnknownRoom(room_id.to_string()))?;

        handle
            .commands
            .send(command)
            .map_err(|_| RelayError::RoomClosed(room_id.to_string()))
    }

    /// A copy of a room's current state, taken after every command queued
    /// before this call has been applied.
    pub async fn snapshot(&self, room_id: &str) -> Option<Room> {
        let (reply, response) = oneshot::channel();
        self.dispatch(room_id, RoomCommand::Snapshot { reply })
            .await
            .ok()?;

        response.await.ok()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
