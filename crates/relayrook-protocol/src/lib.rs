//! Wire protocol for Relayrook.
//!
//! This crate defines the "language" that chess clients and the relay
//! server speak:
//!
//! - **Messages** ([`Message`], [`tags`]) — the closed catalog of frames
//!   that travel on the wire, one byte tag per variant.
//! - **Codec** ([`encode_message`], [`read_message`], [`write_message`]) —
//!   how those frames are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding
//!   or decoding.
//!
//! # Architecture
//!
//! The protocol layer is the leaf of the stack. It knows nothing about
//! sessions, rooms, or clocks — it only reads and writes framed messages
//! on a byte stream.
//!
//! ```text
//! TcpStream (bytes) → Protocol (Message) → Session (player context) → Room
//! ```

mod codec;
mod error;
mod message;

pub use codec::{
    encode_message, read_message, write_message, MAX_STRING_LEN,
};
pub use error::ProtocolError;
pub use message::{tags, Message};
