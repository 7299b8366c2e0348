//! Room registry: tracks every active room by its client-chosen id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::room::RoomHandle;

/// All active rooms, keyed by room id.
///
/// Room ids are compared byte for byte — no trimming, no case folding —
/// so two clients land in the same room only by sending the identical
/// string. Cloning the registry shares the same map.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<String, RoomHandle>>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room with this id, creating it if absent.
    pub async fn lookup_or_create(&self, room_id: &str) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(room_id) {
            return handle.clone();
        }
        let handle = RoomHandle::new(room_id.to_string(), self.clone());
        rooms.insert(room_id.to_string(), handle.clone());
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        handle
    }

    /// Drops a room from the registry. Removing an id that is not
    /// present (e.g. a room that already reaped itself) is a no-op.
    pub async fn remove(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().await;
        if rooms.remove(room_id).is_some() {
            tracing::info!(%room_id, rooms = rooms.len(), "room removed");
        }
    }

    /// Whether a room with this id is currently active.
    pub async fn contains(&self, room_id: &str) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    /// Number of active rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// `true` when no rooms are active.
    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}
