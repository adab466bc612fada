//! Error types for the room layer.
//!
//! Every variant except [`RoomError::InvariantViolation`] is recoverable:
//! the lobby sends its `Display` text back to the client as the failure
//! reason and keeps serving.

use cardlobby_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Another waiting or running player already uses this name.
    #[error("name already in use")]
    NameTaken,

    #[error(transparent)]
    InvalidName(#[from] SessionError),

    /// Every port of the configured range is claimed or busy.
    #[error("no free port found")]
    NoFreePort,

    #[error("no player with that name hosts a game right now")]
    NoSuchRoom,

    #[error("that room is already full")]
    RoomFull,

    #[error("you are not part of any waiting room")]
    NotInAnyRoom,

    /// The connection is attached to a different player's seat.
    #[error("this connection belongs to another player")]
    NotYourSeat,

    #[error("your deck has the wrong size (expected {expected} entries, got {actual})")]
    WrongDeckSize { expected: usize, actual: usize },

    #[error("you have no opponent yet")]
    NoOpponent,

    /// The ready flag was recorded; the match starts once the opponent
    /// is ready too.
    #[error("your opponent isn't ready yet")]
    OpponentNotReady,

    /// Registry state that create/join/leave should never produce.
    #[error("room registry invariant violated: {0}")]
    InvariantViolation(String),
}
