mod lease;
mod memory_store;
mod relay_store;

pub use lease::Lease;
pub use memory_store::MemoryStore;
pub use relay_store::RelayStore;

use crate::error::Result;
use async_trait::async_trait;
use copresence_core::protocol::{MailboxEntry, MessageKey};
use copresence_core::{
    Directory, DirectoryChange, PeerId, PresenceRecord, RecordPatch, RoomId, SignalEnvelope,
};
use tokio::sync::{broadcast, mpsc};

/// Shared presence directory, room set and per-peer mailboxes.
///
/// Implementations must make every room membership change atomic: two
/// concurrent claims involving the same peer never both succeed, and a room
/// is never collected while a concurrent join leaves it with two occupants.
#[async_trait]
pub trait PresenceStore: Send + Sync + 'static {
    /// Publishes `record`. The returned lease removes it (and its mailbox)
    /// when dropped.
    async fn register(&self, record: PresenceRecord) -> Result<Lease>;

    async fn update(&self, peer_id: &PeerId, patch: RecordPatch) -> Result<()>;

    async fn record(&self, peer_id: &PeerId) -> Result<Option<PresenceRecord>>;

    async fn directory(&self) -> Result<Directory>;

    async fn watch_directory(&self) -> Result<broadcast::Receiver<DirectoryChange>>;

    /// Creates `room_id` and places both peers in it. Fails with
    /// `Conflict` if either peer already has a room.
    async fn claim_room(&self, initiator: &PeerId, target: &PeerId, room_id: &RoomId)
    -> Result<()>;

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool>;

    /// Moves `peer_id` into `room_id`, collecting the room it left if that
    /// room is now down to one occupant. Returns the room it left.
    async fn join_room(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<Option<RoomId>>;

    /// Clears `peer_id`'s room and collects it once at most one record
    /// still points at it. Fails with `NotInRoom` if the peer has no room.
    async fn leave_room(&self, peer_id: &PeerId) -> Result<RoomId>;

    /// Appends to `target`'s mailbox. Fails with `PeerUnavailable` when the
    /// target is not registered.
    async fn push(&self, target: &PeerId, envelope: SignalEnvelope) -> Result<MessageKey>;

    /// Streams `owner`'s mailbox, starting with entries still pending.
    async fn watch_mailbox(&self, owner: &PeerId) -> Result<mpsc::UnboundedReceiver<MailboxEntry>>;

    async fn ack(&self, owner: &PeerId, key: MessageKey) -> Result<()>;
}
