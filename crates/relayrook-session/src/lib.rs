//! Player session management for Relayrook.
//!
//! A [`Session`] wraps one connected socket and lets room logic treat it
//! as "send whenever you want; block for the next inbound message" even
//! though a TCP stream is a single duplex pipe:
//!
//! 1. **Receive multiplexing** — one background reader task per session
//!    decodes frames and hands them over a capacity-one channel, so at
//!    most one undelivered inbound frame exists at a time and nothing
//!    else ever reads the socket.
//! 2. **Ping filtering** — liveness probes are consumed inside the
//!    reader loop and never surface to game logic.
//! 3. **Turn clock** — a monotonic elapsed-time counter
//!    ([`TurnClock`]) billed only while it is this player's turn.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← owns two sessions, relays moves between them
//!     ↕
//! Session Layer (this crate)  ← one socket, one reader task, one clock
//!     ↕
//! Protocol Layer (below)  ← frames bytes into Messages
//! ```

mod clock;
mod error;
mod session;

pub use clock::TurnClock;
pub use error::SessionError;
pub use session::Session;
