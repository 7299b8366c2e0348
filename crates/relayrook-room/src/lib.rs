//! Match rooms for Relayrook.
//!
//! A room seats at most two players, introduces them to each other, and
//! — once both are seated and ready — relays moves between them while
//! billing each player's turn clock. The room is also where every
//! departure is handled: evicting one seat notifies the other, and a
//! peer that fails to acknowledge the notice is evicted in turn, so a
//! single broken connection unwinds the whole room.
//!
//! Rooms are tracked by a [`RoomRegistry`] keyed by the room id the
//! client asked for. A room that ends up with no seated players removes
//! itself from the registry.

mod error;
mod registry;
mod room;

pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{Color, JoinOutcome, JoinPrefs, RoomHandle, DEFAULT_START_FEN};
