//! Error types for the room layer.

use sigame_pack::PackError;

/// Errors that can occur while opening or joining a room.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A Leader is already registered with this room's hub.
    /// A room seats exactly one host.
    #[error("a leader is already registered")]
    LeaderTaken,

    /// The room's hub has shut down — the game reached a terminal state
    /// between lookup and registration.
    #[error("room is closed")]
    Closed,

    /// The referenced pack could not be opened.
    #[error(transparent)]
    Pack(#[from] PackError),
}
