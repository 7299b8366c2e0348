//! Unified error type for the server.

use relayrook_protocol::ProtocolError;
use relayrook_room::RoomError;
use relayrook_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (send on a lost connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, in game, rejected).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A socket-level error (bind, accept).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("bad configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Protocol(_)));
        assert!(server_err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_session_error() {
        let server_err: ServerError = SessionError::Closed.into();
        assert!(matches!(server_err, ServerError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::RoomFull("r1".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
        assert!(server_err.to_string().contains("r1"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Config(_)));
    }
}
