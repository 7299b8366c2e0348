//! Per-connection handler: hello exchange, preference exchange, room join.
//!
//! Each accepted connection gets its own task running this handler. The
//! flow is:
//!   1. Send `ServerHello` with a fresh session id
//!   2. Receive `ClientHello` → validate the protocol version
//!   3. `Ack`, ask for preferences, receive `ClientPrefs`
//!   4. `Ack`, wrap the socket in a session, seat it in the room
//!
//! The handler runs on the raw stream; the session (and its background
//! reader) only exists once the handshake has succeeded. After a join
//! the game kickoff is spawned on its own task so the handler can exit.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpStream;
use tokio::time::timeout;

use relayrook_protocol::{read_message, write_message, Message, ProtocolError};
use relayrook_room::JoinPrefs;
use relayrook_session::Session;

use crate::server::{ServerState, PROTOCOL_VERSION, SERVER_VERSION};
use crate::ServerError;

/// How long a client gets to produce each handshake frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between a refusal and the close, so the client can read the
/// refusal before the socket vanishes under it.
const REJECT_GRACE: Duration = Duration::from_secs(1);

/// Handles a single connection from accept to seat.
pub(crate) async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let session_id = new_session_id();
    tracing::debug!(%peer, %session_id, "handling new connection");

    write_message(
        &mut stream,
        &Message::ServerHello {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_version: SERVER_VERSION.to_string(),
            session_id: session_id.clone(),
        },
    )
    .await?;

    let (client_protocol, client_version, user_name, room_id) =
        match recv_handshake_frame(&mut stream).await? {
            Message::ClientHello {
                protocol_version,
                client_version,
                user_name,
                room_id,
            } => (protocol_version, client_version, user_name, room_id),
            other => {
                tracing::debug!(%peer, frame = %other, "expected client hello");
                let _ = write_message(&mut stream, &Message::Reject).await;
                return Err(ProtocolError::InvalidMessage(
                    "first frame must be a client hello".into(),
                )
                .into());
            }
        };

    if client_protocol != PROTOCOL_VERSION {
        tracing::info!(
            %peer,
            client_protocol = %client_protocol,
            "incompatible protocol version"
        );
        let _ = write_message(&mut stream, &Message::Reject).await;
        let _ = write_message(
            &mut stream,
            &Message::Shutdown {
                reason: "Incompatible version!".to_string(),
            },
        )
        .await;
        tokio::time::sleep(REJECT_GRACE).await;
        return Ok(());
    }

    write_message(&mut stream, &Message::Ack).await?;
    write_message(&mut stream, &Message::GiveYourPrefs).await?;

    let (preferred_clock_millis, start_fen, games) =
        match recv_handshake_frame(&mut stream).await? {
            Message::ClientPrefs {
                preferred_clock_millis,
                start_fen,
                games,
            } => (preferred_clock_millis, start_fen, games),
            other => {
                tracing::debug!(%peer, frame = %other, "expected client prefs");
                let _ = write_message(&mut stream, &Message::Reject).await;
                return Err(ProtocolError::InvalidMessage(
                    "expected client prefs".into(),
                )
                .into());
            }
        };

    if games != 1 {
        tracing::info!(%peer, games, "unsupported game count");
        let _ = write_message(&mut stream, &Message::Reject).await;
        tokio::time::sleep(REJECT_GRACE).await;
        return Ok(());
    }

    write_message(&mut stream, &Message::Ack).await?;

    tracing::info!(
        %peer,
        %session_id,
        user = %user_name,
        client_version = %client_version,
        room = %room_id,
        "client connected"
    );

    let session = Session::new(stream, user_name, session_id);
    let room = state.rooms.lookup_or_create(&room_id).await;
    match room
        .try_add_player(
            session,
            JoinPrefs {
                preferred_clock_millis,
                start_fen,
            },
        )
        .await
    {
        Ok(outcome) => {
            tracing::debug!(
                room = %room.room_id(),
                color = %outcome.color,
                ready = outcome.ready_to_start,
                "player seated"
            );
            // No-op unless both seats hold live players; must outlive
            // this handler because it runs the whole game.
            tokio::spawn(async move { room.try_start_new_game().await });
            Ok(())
        }
        Err(e) => {
            // The session was already told why and closed.
            tracing::info!(room = %room_id, error = %e, "join failed");
            Ok(())
        }
    }
}

/// Reads the next non-ping frame, bounded by the handshake timeout.
async fn recv_handshake_frame(stream: &mut TcpStream) -> Result<Message, ServerError> {
    loop {
        match timeout(HANDSHAKE_TIMEOUT, read_message(stream)).await {
            Ok(Ok(Some(Message::Ping))) => continue,
            Ok(Ok(Some(msg))) => return Ok(msg),
            Ok(Ok(None)) => {
                return Err(ProtocolError::InvalidMessage(
                    "connection closed during handshake".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProtocolError::InvalidMessage(
                    "handshake timed out".into(),
                )
                .into());
            }
        }
    }
}

/// A fresh 128-bit session id, rendered as 32 hex characters.
fn new_session_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    let mut id = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_32_hex_chars() {
        let id = new_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
    }
}
