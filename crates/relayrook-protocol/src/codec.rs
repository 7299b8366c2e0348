//! Binary codec: one-byte tag, then the variant's fields in declared order.
//!
//! Field encodings (one consistent choice, documented here):
//!
//! - **strings** — a 7-bit variable-length byte count (little-endian
//!   groups, 0x80 continuation bit) followed by UTF-8 bytes. This is the
//!   platform-neutral "7-bit encoded length" convention.
//! - **integers** — fixed-width little-endian two's complement
//!   (`i32`/`i64`).
//! - **booleans** — one byte, zero is false.
//!
//! Decoding reads the tag, dispatches to the variant, and reads its
//! fields in the same order. Two conditions yield `Ok(None)` rather than
//! an error: clean EOF before the tag byte, and a tag absent from the
//! registry (which consumes exactly the one tag byte). Anything that
//! fails *inside* a frame — truncation, oversize length, bad UTF-8 — is
//! a [`ProtocolError`], and callers treat it like a dead connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{tags, Message, ProtocolError};

/// Maximum byte length of a single string field (64 KiB). Room ids,
/// usernames, FENs, and move names are all far below this; the guard
/// bounds allocation when a peer sends a garbage length prefix.
pub const MAX_STRING_LEN: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn put_varint(buf: &mut Vec<u8>, mut value: usize) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    put_varint(buf, s.len());
    buf.extend_from_slice(s.as_bytes());
}

fn put_bool(buf: &mut Vec<u8>, b: bool) {
    buf.push(u8::from(b));
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Encodes a message as a standalone frame: tag byte, then fields.
///
/// Infallible — every catalog value has a valid encoding. Oversized
/// strings cannot occur on the encode side because the relay only ever
/// echoes strings it already accepted on decode.
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut buf = vec![msg.tag()];
    match msg {
        Message::ServerHello {
            protocol_version,
            server_version,
            session_id,
        } => {
            put_string(&mut buf, protocol_version);
            put_string(&mut buf, server_version);
            put_string(&mut buf, session_id);
        }
        Message::ClientHello {
            protocol_version,
            client_version,
            user_name,
            room_id,
        } => {
            put_string(&mut buf, protocol_version);
            put_string(&mut buf, client_version);
            put_string(&mut buf, user_name);
            put_string(&mut buf, room_id);
        }
        Message::Ack
        | Message::Reject
        | Message::Ping
        | Message::GiveYourPrefs
        | Message::PlayerLeft
        | Message::IsReady
        | Message::GameStart => {}
        Message::Shutdown { reason } => put_string(&mut buf, reason),
        Message::ClientPrefs {
            preferred_clock_millis,
            start_fen,
            games,
        } => {
            put_i64(&mut buf, *preferred_clock_millis);
            put_string(&mut buf, start_fen);
            put_i32(&mut buf, *games);
        }
        Message::PlayerJoined { user_name } => {
            put_string(&mut buf, user_name);
        }
        Message::GetReady {
            is_white,
            clock_time_millis,
            game_start_fen,
        } => {
            put_bool(&mut buf, *is_white);
            put_i64(&mut buf, *clock_time_millis);
            put_string(&mut buf, game_start_fen);
        }
        Message::Move {
            move_name,
            your_clock_elapsed,
            opponent_clock_elapsed,
        } => {
            put_string(&mut buf, move_name);
            put_i64(&mut buf, *your_clock_elapsed);
            put_i64(&mut buf, *opponent_clock_elapsed);
        }
        Message::GameOver { reason } => put_string(&mut buf, reason),
        Message::Timeout { it_was_you } => put_bool(&mut buf, *it_was_you),
    }
    buf
}

/// Encodes and writes one frame, then flushes.
pub async fn write_message<W>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_message(msg);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

async fn read_varint<R>(reader: &mut R) -> Result<usize, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut value: usize = 0;
    // 5 groups of 7 bits cover the u32 range the length prefix uses.
    for shift in (0..35).step_by(7) {
        let byte = reader.read_u8().await?;
        value |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolError::BadLengthPrefix)
}

async fn read_string<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = read_varint(reader).await?;
    if len > MAX_STRING_LEN {
        return Err(ProtocolError::StringTooLong(len));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
}

async fn read_bool<R>(reader: &mut R) -> Result<bool, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    Ok(reader.read_u8().await? != 0)
}

async fn read_i32<R>(reader: &mut R) -> Result<i32, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).await?;
    Ok(i32::from_le_bytes(bytes))
}

async fn read_i64<R>(reader: &mut R) -> Result<i64, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes).await?;
    Ok(i64::from_le_bytes(bytes))
}

/// Reads one frame from the stream.
///
/// Returns `Ok(None)` when the stream closes cleanly before a tag byte
/// arrives, and for tags outside the registry (consuming exactly the one
/// tag byte — the fields of an unknown frame cannot be skipped, so the
/// caller must treat the connection as unusable either way).
pub async fn read_message<R>(
    reader: &mut R,
) -> Result<Option<Message>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let tag = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let msg = match tag {
        tags::SERVER_HELLO => Message::ServerHello {
            protocol_version: read_string(reader).await?,
            server_version: read_string(reader).await?,
            session_id: read_string(reader).await?,
        },
        tags::CLIENT_HELLO => Message::ClientHello {
            protocol_version: read_string(reader).await?,
            client_version: read_string(reader).await?,
            user_name: read_string(reader).await?,
            room_id: read_string(reader).await?,
        },
        tags::ACK => Message::Ack,
        tags::REJECT => Message::Reject,
        tags::SHUTDOWN => Message::Shutdown {
            reason: read_string(reader).await?,
        },
        tags::PING => Message::Ping,
        tags::GIVE_YOUR_PREFS => Message::GiveYourPrefs,
        tags::CLIENT_PREFS => Message::ClientPrefs {
            preferred_clock_millis: read_i64(reader).await?,
            start_fen: read_string(reader).await?,
            games: read_i32(reader).await?,
        },
        tags::PLAYER_JOINED => Message::PlayerJoined {
            user_name: read_string(reader).await?,
        },
        tags::PLAYER_LEFT => Message::PlayerLeft,
        tags::GET_READY => Message::GetReady {
            is_white: read_bool(reader).await?,
            clock_time_millis: read_i64(reader).await?,
            game_start_fen: read_string(reader).await?,
        },
        tags::IS_READY => Message::IsReady,
        tags::GAME_START => Message::GameStart,
        tags::MOVE => Message::Move {
            move_name: read_string(reader).await?,
            your_clock_elapsed: read_i64(reader).await?,
            opponent_clock_elapsed: read_i64(reader).await?,
        },
        tags::GAME_OVER => Message::GameOver {
            reason: read_string(reader).await?,
        },
        tags::TIMEOUT => Message::Timeout {
            it_was_you: read_bool(reader).await?,
        },
        _ => return Ok(None),
    };

    Ok(Some(msg))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn round_trip(msg: &Message) -> Message {
        let bytes = encode_message(msg);
        let mut cursor = bytes.as_slice();
        read_message(&mut cursor)
            .await
            .expect("decode should succeed")
            .expect("a known tag must decode to a message")
    }

    #[tokio::test]
    async fn test_round_trip_every_variant() {
        let samples = vec![
            Message::ServerHello {
                protocol_version: "0.1".into(),
                server_version: "0.1".into(),
                session_id: "deadbeefdeadbeefdeadbeefdeadbeef".into(),
            },
            Message::ClientHello {
                protocol_version: "0.1".into(),
                client_version: "0.2".into(),
                user_name: "alice".into(),
                room_id: "r1".into(),
            },
            Message::Ack,
            Message::Reject,
            Message::Shutdown {
                reason: "Incompatible version!".into(),
            },
            Message::Ping,
            Message::GiveYourPrefs,
            Message::ClientPrefs {
                preferred_clock_millis: 60_000,
                start_fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
                    .into(),
                games: 1,
            },
            Message::PlayerJoined {
                user_name: "bob".into(),
            },
            Message::PlayerLeft,
            Message::GetReady {
                is_white: false,
                clock_time_millis: 30_000,
                game_start_fen: "8/8/8/8/8/8/8/K6k w - - 0 1".into(),
            },
            Message::IsReady,
            Message::GameStart,
            Message::Move {
                move_name: "e2e4".into(),
                your_clock_elapsed: 500,
                opponent_clock_elapsed: 1_234,
            },
            Message::GameOver {
                reason: "resignation".into(),
            },
            Message::Timeout { it_was_you: true },
        ];
        for msg in samples {
            assert_eq!(round_trip(&msg).await, msg);
        }
    }

    #[tokio::test]
    async fn test_round_trip_empty_strings() {
        // Zero-length strings are legal everywhere a string appears.
        let msg = Message::Move {
            move_name: String::new(),
            your_clock_elapsed: 0,
            opponent_clock_elapsed: 0,
        };
        assert_eq!(round_trip(&msg).await, msg);

        let msg = Message::Shutdown {
            reason: String::new(),
        };
        assert_eq!(round_trip(&msg).await, msg);
    }

    #[tokio::test]
    async fn test_round_trip_negative_and_extreme_integers() {
        // -1 is the "unset" clock sentinel and must survive the trip.
        let msg = Message::ClientPrefs {
            preferred_clock_millis: -1,
            start_fen: String::new(),
            games: i32::MIN,
        };
        assert_eq!(round_trip(&msg).await, msg);

        let msg = Message::Move {
            move_name: "a1a2".into(),
            your_clock_elapsed: i64::MAX,
            opponent_clock_elapsed: i64::MIN,
        };
        assert_eq!(round_trip(&msg).await, msg);
    }

    #[tokio::test]
    async fn test_string_longer_than_127_bytes_uses_multibyte_varint() {
        // 300 bytes needs two prefix bytes (0xAC 0x02).
        let long = "x".repeat(300);
        let msg = Message::GameOver {
            reason: long.clone(),
        };
        let bytes = encode_message(&msg);
        assert_eq!(bytes[1], 0xac);
        assert_eq!(bytes[2], 0x02);
        assert_eq!(round_trip(&msg).await, msg);
    }

    #[tokio::test]
    async fn test_non_ascii_strings_round_trip() {
        let msg = Message::PlayerJoined {
            user_name: "Grünfeld ♞".into(),
        };
        assert_eq!(round_trip(&msg).await, msg);
    }

    #[tokio::test]
    async fn test_unknown_tag_yields_no_message_and_consumes_one_byte() {
        // 0x07 is not in the registry. Decode must return None without
        // touching the bytes after the tag.
        let bytes = [0x07u8, 0xAA, 0xBB];
        let mut cursor = bytes.as_slice();
        let decoded = read_message(&mut cursor).await.expect("not an error");
        assert!(decoded.is_none());
        assert_eq!(cursor, &[0xAA, 0xBB], "exactly one byte consumed");
    }

    #[tokio::test]
    async fn test_eof_before_tag_yields_no_message() {
        let mut cursor: &[u8] = &[];
        let decoded = read_message(&mut cursor).await.expect("not an error");
        assert!(decoded.is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        // A Shutdown frame cut off inside the reason string.
        let mut bytes = encode_message(&Message::Shutdown {
            reason: "connection reset".into(),
        });
        bytes.truncate(bytes.len() - 4);
        let mut cursor = bytes.as_slice();
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn test_oversize_length_prefix_is_rejected_before_allocation() {
        // Tag for Shutdown, then a varint declaring ~256 MiB.
        let bytes = [tags::SHUTDOWN, 0x80, 0x80, 0x80, 0x80, 0x01];
        let mut cursor = bytes.as_slice();
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::StringTooLong(_)));
    }

    #[tokio::test]
    async fn test_runaway_varint_is_rejected() {
        // Six continuation bytes — more than the format allows.
        let bytes = [tags::SHUTDOWN, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let mut cursor = bytes.as_slice();
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadLengthPrefix));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let bytes = [tags::SHUTDOWN, 0x02, 0xff, 0xfe];
        let mut cursor = bytes.as_slice();
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8));
    }

    #[tokio::test]
    async fn test_multiple_frames_in_sequence() {
        let first = Message::Ack;
        let second = Message::Move {
            move_name: "g1f3".into(),
            your_clock_elapsed: 10,
            opponent_clock_elapsed: 20,
        };
        let mut bytes = encode_message(&first);
        bytes.extend(encode_message(&second));

        let mut cursor = bytes.as_slice();
        assert_eq!(read_message(&mut cursor).await.unwrap(), Some(first));
        assert_eq!(read_message(&mut cursor).await.unwrap(), Some(second));
        assert_eq!(read_message(&mut cursor).await.unwrap(), None);
    }

    #[test]
    fn test_bool_encoding_is_one_byte() {
        let frame = encode_message(&Message::Timeout { it_was_you: true });
        assert_eq!(frame, vec![tags::TIMEOUT, 1]);
        let frame = encode_message(&Message::Timeout { it_was_you: false });
        assert_eq!(frame, vec![tags::TIMEOUT, 0]);
    }

    #[test]
    fn test_integers_are_little_endian() {
        let frame = encode_message(&Message::ClientPrefs {
            preferred_clock_millis: 1,
            start_fen: String::new(),
            games: 1,
        });
        // tag, i64 = 1 LE, empty string (len 0), i32 = 1 LE
        assert_eq!(
            frame,
            vec![tags::CLIENT_PREFS, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }
}
