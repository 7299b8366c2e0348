//! Error types for the session layer.

use relayrook_protocol::ProtocolError;

/// Errors that can occur while operating on a session.
///
/// Receives never error — a dead or unreadable connection surfaces as
/// "no message" from [`Session::next_message`](crate::Session::next_message).
/// Sends do error, so the room can react to a lost peer immediately.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Writing a frame failed; the connection is gone.
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] ProtocolError),

    /// The session was already shut down.
    #[error("session is closed")]
    Closed,
}
