use crate::error::{Result, SignalError};
use crate::store::PresenceStore;
use copresence_core::{PeerId, RoomId};
use std::sync::Arc;
use tracing::info;

/// Room lifecycle on top of a [`PresenceStore`].
///
/// A room lives as long as at least two records point at it. The store
/// collects it in the same step that leaves it with one occupant or none.
#[derive(Clone)]
pub struct RoomRegistry {
    store: Arc<dyn PresenceStore>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    /// Puts `initiator` and `target` in a fresh room.
    pub async fn create(&self, initiator: &PeerId, target: &PeerId) -> Result<RoomId> {
        if initiator == target {
            return Err(SignalError::Conflict(target.clone()));
        }
        let room_id = RoomId::new();
        self.store.claim_room(initiator, target, &room_id).await?;
        Ok(room_id)
    }

    /// Moves `peer_id` into `room_id`, leaving its previous room first.
    pub async fn join(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<()> {
        let previous = self.store.join_room(peer_id, room_id).await?;
        match previous {
            Some(previous) => info!(
                peer = %peer_id.short(),
                room = %room_id,
                left = %previous,
                "moved to room"
            ),
            None => info!(peer = %peer_id.short(), room = %room_id, "joined room"),
        }
        Ok(())
    }

    /// Clears `peer_id`'s room. The store collects the room in the same step
    /// if it is left with one occupant or none.
    pub async fn leave(&self, peer_id: &PeerId) -> Result<RoomId> {
        let room_id = self.store.leave_room(peer_id).await?;
        info!(peer = %peer_id.short(), room = %room_id, "left room");
        Ok(room_id)
    }

    /// Ids of the peers whose record names `room_id`. Empty once the room
    /// has been deleted, even if stale records still point at it.
    pub async fn peers_in(&self, room_id: &RoomId) -> Result<Vec<PeerId>> {
        if !self.store.room_exists(room_id).await? {
            return Ok(Vec::new());
        }
        let directory = self.store.directory().await?;
        Ok(directory
            .in_room(room_id)
            .map(|record| record.peer_id.clone())
            .collect())
    }
}
