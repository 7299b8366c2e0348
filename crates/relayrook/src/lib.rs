//! # Relayrook
//!
//! A relay server for two-player chess matches. Relayrook never judges
//! a position: it introduces two clients who asked for the same room,
//! walks them through a ready handshake, then forwards moves between
//! them while billing each side's turn clock.
//!
//! The stack, bottom to top:
//!
//! - [`relayrook_protocol`] — frames bytes into messages and back;
//! - [`relayrook_session`] — one socket per player, multiplexed;
//! - [`relayrook_room`] — two seats, introductions, the relay loop;
//! - this crate — the TCP listener, handshake, and server binary.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use relayrook::RelayServer;
//!
//! # async fn run() -> Result<(), relayrook::ServerError> {
//! let server = RelayServer::builder().port(4578).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{RelayServer, RelayServerBuilder, PROTOCOL_VERSION, SERVER_VERSION};
