//! The session: one player's connection, multiplexed for room logic.
//!
//! A TCP stream allows one reader and one writer at a time. The room
//! wants "send now" and "block until the next inbound frame" to be
//! independent operations, so the session splits the stream: a single
//! background task owns the read half for the connection's lifetime and
//! forwards decoded frames through a capacity-one channel, while `send`
//! writes to the owned write half. `&mut self` on every operation gives
//! the mutual exclusion a shared handle would need a lock for, and the
//! lone reader task is what guarantees no two reads are ever
//! outstanding on the socket.

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use relayrook_protocol::{read_message, write_message, Message};

use crate::{SessionError, TurnClock};

/// A live, authenticated connection to one participant.
///
/// Created after the listener's hello/prefs handshake succeeds;
/// destroyed when the player leaves the room or the room is torn down.
pub struct Session {
    session_id: String,
    user_name: String,
    writer: Option<OwnedWriteHalf>,
    inbox: mpsc::Receiver<Message>,
    /// One frame pulled out of the inbox by a non-blocking poll but not
    /// yet consumed by `next_message`.
    peeked: Option<Message>,
    /// Set once the reader task has ended and the inbox is drained.
    dead: bool,
    reader: Option<JoinHandle<()>>,
    clock: TurnClock,
}

impl Session {
    /// Wraps a connected stream and spawns its background reader.
    pub fn new(
        stream: TcpStream,
        user_name: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        let (read_half, write_half) = stream.into_split();

        // Capacity 1: the reader blocks until the previous frame is
        // consumed, so at most one undelivered inbound frame exists.
        let (tx, rx) = mpsc::channel(1);
        let reader = tokio::spawn(read_loop(
            read_half,
            tx,
            session_id.clone(),
        ));

        Self {
            session_id,
            user_name: user_name.into(),
            writer: Some(write_half),
            inbox: rx,
            peeked: None,
            dead: false,
            reader: Some(reader),
            clock: TurnClock::new(),
        }
    }

    /// The opaque identifier assigned by the listener at handshake.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The name the client introduced itself with.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Writes one frame to the peer.
    ///
    /// # Errors
    /// [`SessionError::ConnectionLost`] if the write fails, so the room
    /// can treat the peer as gone immediately.
    pub async fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        let writer = self.writer.as_mut().ok_or(SessionError::Closed)?;
        write_message(writer, msg).await?;
        tracing::trace!(session_id = %self.session_id, %msg, "frame sent");
        Ok(())
    }

    /// Non-blocking: has the background reader already produced a frame?
    pub fn has_pending_message(&mut self) -> bool {
        self.poll_inbox();
        self.peeked.is_some()
    }

    /// `true` while the connection can still produce frames — either one
    /// is already queued or the reader task is still running.
    pub fn is_live(&mut self) -> bool {
        self.poll_inbox();
        self.peeked.is_some() || !self.dead
    }

    /// Blocks until the next inbound frame arrives.
    ///
    /// `None` means the connection is dead or unreadable — there will
    /// never be another frame. Cancel-safe: if the future is dropped
    /// (e.g. losing a `select!` race against a clock deadline), no frame
    /// is lost.
    pub async fn next_message(&mut self) -> Option<Message> {
        if let Some(msg) = self.peeked.take() {
            return Some(msg);
        }
        match self.inbox.recv().await {
            Some(msg) => Some(msg),
            None => {
                self.dead = true;
                None
            }
        }
    }

    /// Starts billing time to this player.
    pub fn start_clock(&mut self) {
        self.clock.start();
    }

    /// Stops billing time to this player.
    pub fn pause_clock(&mut self) {
        self.clock.pause();
    }

    /// Zeroes the clock between games.
    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }

    /// Total time billed to this player, in milliseconds.
    pub fn elapsed_millis(&self) -> i64 {
        self.clock.elapsed_millis()
    }

    /// Cancels the background reader, waits for it to finish, and closes
    /// the socket. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            // Wait so the read half is dropped before we return; the
            // JoinError from an aborted task is expected.
            let _ = reader.await;
        }
        if let Some(mut writer) = self.writer.take() {
            use tokio::io::AsyncWriteExt;
            let _ = writer.shutdown().await;
        }
        self.dead = true;
    }

    fn poll_inbox(&mut self) {
        if self.peeked.is_some() || self.dead {
            return;
        }
        match self.inbox.try_recv() {
            Ok(msg) => self.peeked = Some(msg),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.dead = true,
        }
    }
}

/// The reader task is aborted by `shutdown`, but sessions can also be
/// dropped on error paths before anyone calls it; abort here so the
/// socket is always released.
impl Drop for Session {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Background receive loop: decode frames, drop pings, forward the rest.
///
/// Exits when the peer closes or breaks the stream, or when the session
/// stops consuming (channel closed). Dropping `tx` is what signals
/// "no more frames ever" to `next_message`.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    tx: mpsc::Sender<Message>,
    session_id: String,
) {
    loop {
        match read_message(&mut read_half).await {
            // Liveness probes stay invisible to game logic.
            Ok(Some(Message::Ping)) => continue,
            Ok(Some(msg)) => {
                tracing::trace!(%session_id, %msg, "frame received");
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(%session_id, "inbound stream ended");
                break;
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "inbound decode failed");
                break;
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// A (session, raw client stream) pair over real localhost TCP.
    async fn session_pair() -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let client = TcpStream::connect(addr).await.expect("connect");
        let (server_side, _) = listener.accept().await.expect("accept");
        let session = Session::new(server_side, "alice", "sess-1");
        (session, client)
    }

    async fn client_send(client: &mut TcpStream, msg: &Message) {
        write_message(client, msg).await.expect("client write");
    }

    #[tokio::test]
    async fn test_next_message_delivers_inbound_frame() {
        let (mut session, mut client) = session_pair().await;
        client_send(&mut client, &Message::Ack).await;

        assert_eq!(session.next_message().await, Some(Message::Ack));
    }

    #[tokio::test]
    async fn test_pings_are_filtered_out() {
        let (mut session, mut client) = session_pair().await;
        client_send(&mut client, &Message::Ping).await;
        client_send(&mut client, &Message::Ping).await;
        client_send(&mut client, &Message::IsReady).await;

        // The first surfaced frame must be the non-ping one.
        assert_eq!(session.next_message().await, Some(Message::IsReady));
    }

    #[tokio::test]
    async fn test_has_pending_message_polls_without_consuming() {
        let (mut session, mut client) = session_pair().await;
        assert!(!session.has_pending_message());

        client_send(&mut client, &Message::GameStart).await;
        // Give the reader task a moment to pick the frame up.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(session.has_pending_message());
        assert!(session.has_pending_message(), "poll must not consume");
        assert_eq!(session.next_message().await, Some(Message::GameStart));
        assert!(!session.has_pending_message());
    }

    #[tokio::test]
    async fn test_closed_connection_yields_none_and_not_live() {
        let (mut session, client) = session_pair().await;
        drop(client);

        assert_eq!(session.next_message().await, None);
        assert!(!session.is_live());
    }

    #[tokio::test]
    async fn test_frames_sent_before_close_are_still_delivered() {
        let (mut session, mut client) = session_pair().await;
        client_send(&mut client, &Message::IsReady).await;
        // Let the reader queue the frame before the close lands.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(client);

        assert_eq!(session.next_message().await, Some(Message::IsReady));
        assert_eq!(session.next_message().await, None);
    }

    #[tokio::test]
    async fn test_send_reaches_the_peer() {
        let (mut session, mut client) = session_pair().await;
        session
            .send(&Message::GetReady {
                is_white: true,
                clock_time_millis: 60_000,
                game_start_fen: "startpos".into(),
            })
            .await
            .expect("send");

        let got = read_message(&mut client).await.expect("client read");
        assert!(matches!(
            got,
            Some(Message::GetReady { is_white: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_the_socket() {
        let (mut session, mut client) = session_pair().await;
        session.shutdown().await;
        session.shutdown().await; // second call must be a no-op

        // The client should observe EOF.
        let got = read_message(&mut client).await.expect("clean eof");
        assert!(got.is_none());

        assert!(matches!(
            session.send(&Message::Ack).await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_next_message_is_cancel_safe_in_select() {
        let (mut session, mut client) = session_pair().await;

        // Lose a race against a short timer first...
        tokio::select! {
            _ = session.next_message() => panic!("no frame should arrive"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }

        // ...then the frame sent afterwards must still come through.
        client_send(&mut client, &Message::PlayerLeft).await;
        assert_eq!(session.next_message().await, Some(Message::PlayerLeft));
    }

    #[tokio::test]
    async fn test_clock_bills_only_while_started() {
        let (mut session, _client) = session_pair().await;
        assert_eq!(session.elapsed_millis(), 0);

        session.start_clock();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.pause_clock();
        let billed = session.elapsed_millis();
        assert!(billed >= 20);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.elapsed_millis(), billed);

        session.reset_clock();
        assert_eq!(session.elapsed_millis(), 0);
    }
}
