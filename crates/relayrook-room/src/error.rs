//! Error types for the room layer.

/// Reasons a player could not be (or stay) seated in a room.
///
/// By the time one of these is returned the joining session has already
/// been told why and closed; callers only log and move on.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's game is already running.
    #[error("room {0} already has a game in progress")]
    GameInProgress(String),

    /// Both seats are taken by live connections.
    #[error("room {0} is full")]
    RoomFull(String),

    /// The seated player turned the newcomer away.
    #[error("join rejected by the seated player in room {0}")]
    JoinRejected(String),

    /// The newcomer never acknowledged the introduction.
    #[error("joining player was unresponsive in room {0}")]
    JoinFailed(String),
}
