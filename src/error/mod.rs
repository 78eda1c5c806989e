use thiserror::Error;

/// Errors raised while routing a client request to a room.
///
/// None of these are fatal: the offending request is dropped and the
/// connection as well as every room stays untouched.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("room '{0}' does not exist")]
    UnknownRoom(String),

    #[error("connection has not joined room '{0}'")]
    NotAMember(String),

    #[error("room '{0}' is no longer accepting commands")]
    RoomClosed(String),

    #[error("failed to serialize packet: {0}")]
    Serialize(#[from] serde_json::Error),
}
