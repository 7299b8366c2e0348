//! Error types for the protocol layer.
//!
//! Each crate in Relayrook defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is on the wire — framing,
//! field encoding, or the underlying socket — not in room or session
//! management.

use crate::codec::MAX_STRING_LEN;

/// Errors that can occur while encoding or decoding wire frames.
///
/// Note that two conditions are deliberately *not* errors: a tag byte
/// that is absent from the registry, and a stream that closes cleanly
/// before the tag byte. Both decode to "no message" (`Ok(None)`) so that
/// callers treat them like a dropped frame rather than a fault.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The underlying stream failed mid-frame (I/O error or truncation).
    #[error("i/o failure on the wire: {0}")]
    Io(#[from] std::io::Error),

    /// A string field declared a length beyond [`MAX_STRING_LEN`].
    /// Treated as a malformed frame — honest peers never send this.
    #[error("string field of {0} bytes exceeds the {MAX_STRING_LEN}-byte limit")]
    StringTooLong(usize),

    /// A string field's bytes were not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A variable-length prefix used more continuation bytes than the
    /// format allows.
    #[error("malformed length prefix")]
    BadLengthPrefix,

    /// The frame decoded cleanly but violates protocol rules, e.g. a
    /// handshake that opens with the wrong message type.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
