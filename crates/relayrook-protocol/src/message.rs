//! The message catalog: every frame that travels on the wire.
//!
//! The catalog is a closed sum type — one variant per one-byte tag, one
//! tag per variant. A tag outside the registry decodes to "no message",
//! never to an error, so a malformed frame is indistinguishable from a
//! dropped one to higher layers.
//!
//! Direction conventions are noted per variant; the relay itself never
//! inspects move contents, only sequencing and timing fields.

use std::fmt;

/// One-byte wire tags, one per [`Message`] variant.
///
/// The numbering is sparse on purpose: related messages share a decade
/// (negotiation in the 0–10 range, room membership in the 20s, game
/// setup in the 25–30 range, play at 40/50, and the terminal timeout
/// at 99).
pub mod tags {
    pub const SERVER_HELLO: u8 = 0;
    pub const CLIENT_HELLO: u8 = 1;
    pub const ACK: u8 = 2;
    pub const REJECT: u8 = 3;
    pub const SHUTDOWN: u8 = 4;
    pub const PING: u8 = 5;
    pub const GIVE_YOUR_PREFS: u8 = 9;
    pub const CLIENT_PREFS: u8 = 10;
    pub const PLAYER_JOINED: u8 = 20;
    pub const PLAYER_LEFT: u8 = 21;
    pub const GET_READY: u8 = 25;
    pub const IS_READY: u8 = 26;
    pub const GAME_START: u8 = 30;
    pub const MOVE: u8 = 40;
    pub const GAME_OVER: u8 = 50;
    pub const TIMEOUT: u8 = 99;
}

/// A single protocol frame.
///
/// Constructed fresh for every encode and every decode; never mutated
/// after construction. Clock fields are milliseconds; `games` counts the
/// games the client wants to play in this room (only `1` is supported).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Server → client, first frame on every connection.
    ServerHello {
        protocol_version: String,
        server_version: String,
        session_id: String,
    },

    /// Client → server reply to [`Message::ServerHello`]. `room_id` is
    /// opaque and used verbatim as the registry key.
    ClientHello {
        protocol_version: String,
        client_version: String,
        user_name: String,
        room_id: String,
    },

    /// Positive acknowledgement, either direction. Gates `PlayerJoined`
    /// and `PlayerLeft`.
    Ack,

    /// Negative acknowledgement, either direction.
    Reject,

    /// "I am closing this connection", either direction.
    Shutdown { reason: String },

    /// Liveness probe. Filtered transparently by the session layer and
    /// never surfaced to room logic.
    Ping,

    /// Server → client: request the client's match preferences.
    GiveYourPrefs,

    /// Client → server reply to [`Message::GiveYourPrefs`].
    ClientPrefs {
        preferred_clock_millis: i64,
        start_fen: String,
        games: i32,
    },

    /// Server → client: the other seat was filled. Ack-gated.
    PlayerJoined { user_name: String },

    /// Server → client: the other seat was vacated. Ack-gated.
    PlayerLeft,

    /// Server → client: game setup. Answered with [`Message::IsReady`].
    GetReady {
        is_white: bool,
        clock_time_millis: i64,
        game_start_fen: String,
    },

    /// Client → server reply to [`Message::GetReady`].
    IsReady,

    /// Server → client: both sides are ready, play begins.
    GameStart,

    /// A move, relayed verbatim between the two sides. The server fills
    /// in both clock readings when forwarding.
    Move {
        move_name: String,
        your_clock_elapsed: i64,
        opponent_clock_elapsed: i64,
    },

    /// Terminal: the game ended for a game-level reason. Sent by one
    /// side, ends the relay loop.
    GameOver { reason: String },

    /// Terminal, server → client: a side exhausted its clock budget.
    Timeout { it_was_you: bool },
}

impl Message {
    /// Returns the wire tag for this variant.
    ///
    /// The tag space is a bijection: this is the inverse of the decode
    /// dispatch in the codec.
    pub fn tag(&self) -> u8 {
        match self {
            Message::ServerHello { .. } => tags::SERVER_HELLO,
            Message::ClientHello { .. } => tags::CLIENT_HELLO,
            Message::Ack => tags::ACK,
            Message::Reject => tags::REJECT,
            Message::Shutdown { .. } => tags::SHUTDOWN,
            Message::Ping => tags::PING,
            Message::GiveYourPrefs => tags::GIVE_YOUR_PREFS,
            Message::ClientPrefs { .. } => tags::CLIENT_PREFS,
            Message::PlayerJoined { .. } => tags::PLAYER_JOINED,
            Message::PlayerLeft => tags::PLAYER_LEFT,
            Message::GetReady { .. } => tags::GET_READY,
            Message::IsReady => tags::IS_READY,
            Message::GameStart => tags::GAME_START,
            Message::Move { .. } => tags::MOVE,
            Message::GameOver { .. } => tags::GAME_OVER,
            Message::Timeout { .. } => tags::TIMEOUT,
        }
    }

    /// Returns the variant name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Message::ServerHello { .. } => "ServerHello",
            Message::ClientHello { .. } => "ClientHello",
            Message::Ack => "Ack",
            Message::Reject => "Reject",
            Message::Shutdown { .. } => "Shutdown",
            Message::Ping => "Ping",
            Message::GiveYourPrefs => "GiveYourPrefs",
            Message::ClientPrefs { .. } => "ClientPrefs",
            Message::PlayerJoined { .. } => "PlayerJoined",
            Message::PlayerLeft => "PlayerLeft",
            Message::GetReady { .. } => "GetReady",
            Message::IsReady => "IsReady",
            Message::GameStart => "GameStart",
            Message::Move { .. } => "Move",
            Message::GameOver { .. } => "GameOver",
            Message::Timeout { .. } => "Timeout",
        }
    }
}

/// Display prints the variant name only, never field contents — frames
/// can carry user-supplied strings and logs should not echo them.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
