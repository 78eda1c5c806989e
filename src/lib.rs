//! Room synchronizer for multiplayer vocabulary quizzes.
//!
//! Clients connect over a websocket, join a room by id and are kept in
//! lockstep by a per-room actor that owns the room state: readiness, the
//! authoritative word order, progress and the winner.

pub mod error;
pub mod relay;
