use crate::error::{Result, SignalError};
use crate::store::{Lease, PresenceStore};
use async_trait::async_trait;
use copresence_core::protocol::{MailboxEntry, MessageKey};
use copresence_core::{
    Directory, DirectoryChange, PeerId, PresenceRecord, RecordPatch, RoomId, SignalEnvelope,
};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::BTreeMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// In-process [`PresenceStore`]. Clones share the same state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: DashMap<PeerId, PresenceRecord>,
    rooms: DashSet<RoomId>,
    mailboxes: DashMap<PeerId, Mailbox>,
    changes: broadcast::Sender<DirectoryChange>,
    next_key: AtomicU64,
    // Serializes every write that touches room membership.
    room_lock: Mutex<()>,
}

#[derive(Default)]
struct Mailbox {
    pending: BTreeMap<MessageKey, SignalEnvelope>,
    subscriber: Option<mpsc::UnboundedSender<MailboxEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANGE_CAPACITY)
    }

    /// `capacity` bounds how many directory changes a slow watcher may lag
    /// behind before it starts missing them.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                records: DashMap::new(),
                rooms: DashSet::new(),
                mailboxes: DashMap::new(),
                changes,
                next_key: AtomicU64::new(1),
                room_lock: Mutex::new(()),
            }),
        }
    }

    /// Messages delivered to `owner` but not yet acknowledged.
    pub fn pending_messages(&self, owner: &PeerId) -> usize {
        self.inner
            .mailboxes
            .get(owner)
            .map(|mailbox| mailbox.pending.len())
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.records.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn publish(&self, change: DirectoryChange) {
        debug!(peer = %change.peer_id().short(), "directory changed");
        let _ = self.changes.send(change);
    }

    fn patch(&self, peer_id: &PeerId, patch: &RecordPatch) -> Result<()> {
        let change = {
            let mut record = self
                .records
                .get_mut(peer_id)
                .ok_or_else(|| SignalError::NotRegistered(peer_id.clone()))?;
            let before = record.clone();
            if !record.apply(patch) {
                return Ok(());
            }
            DirectoryChange::Updated {
                before,
                after: record.clone(),
            }
        };
        self.publish(change);
        Ok(())
    }

    fn update(&self, peer_id: &PeerId, patch: &RecordPatch) -> Result<()> {
        if patch.touches_room() {
            let _guard = self.room_lock.lock();
            self.patch(peer_id, patch)
        } else {
            self.patch(peer_id, patch)
        }
    }

    fn claim(&self, initiator: &PeerId, target: &PeerId, room_id: &RoomId) -> Result<()> {
        let _guard = self.room_lock.lock();

        let initiator_room = self
            .records
            .get(initiator)
            .ok_or_else(|| SignalError::NotRegistered(initiator.clone()))?
            .room_id
            .clone();
        let target_room = self
            .records
            .get(target)
            .ok_or_else(|| SignalError::PeerUnavailable(target.clone()))?
            .room_id
            .clone();

        if initiator_room.is_some() {
            return Err(SignalError::Conflict(initiator.clone()));
        }
        if target_room.is_some() {
            return Err(SignalError::Conflict(target.clone()));
        }

        self.rooms.insert(room_id.clone());
        let patch = RecordPatch::room(Some(room_id.clone()));
        self.patch(initiator, &patch)?;
        self.patch(target, &patch)?;

        info!(
            room = %room_id,
            initiator = %initiator.short(),
            target = %target.short(),
            "room claimed"
        );
        Ok(())
    }

    fn room_of(&self, peer_id: &PeerId) -> Result<Option<RoomId>> {
        Ok(self
            .records
            .get(peer_id)
            .ok_or_else(|| SignalError::NotRegistered(peer_id.clone()))?
            .room_id
            .clone())
    }

    fn join(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<Option<RoomId>> {
        let _guard = self.room_lock.lock();

        let previous = self.room_of(peer_id)?;
        if previous.as_ref() == Some(room_id) {
            return Ok(None);
        }
        self.patch(peer_id, &RecordPatch::room(Some(room_id.clone())))?;
        if let Some(previous) = &previous {
            self.collect_room(previous);
        }
        Ok(previous)
    }

    fn leave(&self, peer_id: &PeerId) -> Result<RoomId> {
        let _guard = self.room_lock.lock();

        let room_id = self.room_of(peer_id)?.ok_or(SignalError::NotInRoom)?;
        self.patch(peer_id, &RecordPatch::room(None))?;
        self.collect_room(&room_id);
        Ok(room_id)
    }

    fn withdraw(&self, peer_id: &PeerId) {
        let _guard = self.room_lock.lock();

        self.mailboxes.remove(peer_id);
        let Some((_, record)) = self.records.remove(peer_id) else {
            return;
        };
        info!(peer = %peer_id.short(), "peer withdrawn");

        let room = record.room_id.clone();
        self.publish(DirectoryChange::Removed { record });
        if let Some(room) = room {
            self.collect_room(&room);
        }
    }

    fn collect_room(&self, room_id: &RoomId) {
        let occupants = self
            .records
            .iter()
            .filter(|record| record.room_id.as_ref() == Some(room_id))
            .count();
        if occupants <= 1 && self.rooms.remove(room_id).is_some() {
            debug!(room = %room_id, occupants, "room collected");
        }
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn register(&self, record: PresenceRecord) -> Result<Lease> {
        let peer_id = record.peer_id.clone();
        match self.inner.records.entry(peer_id.clone()) {
            Entry::Occupied(_) => return Err(SignalError::AlreadyRegistered(peer_id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        self.inner
            .mailboxes
            .insert(peer_id.clone(), Mailbox::default());
        self.inner.publish(DirectoryChange::Inserted { record });
        info!(peer = %peer_id.short(), "peer registered");

        let inner = Arc::downgrade(&self.inner);
        let owner = peer_id.clone();
        Ok(Lease::new(peer_id, move || {
            if let Some(inner) = inner.upgrade() {
                inner.withdraw(&owner);
            }
        }))
    }

    async fn update(&self, peer_id: &PeerId, patch: RecordPatch) -> Result<()> {
        self.inner.update(peer_id, &patch)
    }

    async fn record(&self, peer_id: &PeerId) -> Result<Option<PresenceRecord>> {
        Ok(self.inner.records.get(peer_id).map(|r| r.clone()))
    }

    async fn directory(&self) -> Result<Directory> {
        Ok(self
            .inner
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn watch_directory(&self) -> Result<broadcast::Receiver<DirectoryChange>> {
        Ok(self.inner.changes.subscribe())
    }

    async fn claim_room(
        &self,
        initiator: &PeerId,
        target: &PeerId,
        room_id: &RoomId,
    ) -> Result<()> {
        self.inner.claim(initiator, target, room_id)
    }

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool> {
        Ok(self.inner.rooms.contains(room_id))
    }

    async fn join_room(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<Option<RoomId>> {
        self.inner.join(peer_id, room_id)
    }

    async fn leave_room(&self, peer_id: &PeerId) -> Result<RoomId> {
        self.inner.leave(peer_id)
    }

    async fn push(&self, target: &PeerId, envelope: SignalEnvelope) -> Result<MessageKey> {
        let mut mailbox = self
            .inner
            .mailboxes
            .get_mut(target)
            .ok_or_else(|| SignalError::PeerUnavailable(target.clone()))?;

        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        mailbox.pending.insert(key, envelope.clone());

        let delivered = match &mailbox.subscriber {
            Some(subscriber) => subscriber.send(MailboxEntry { key, envelope }).is_ok(),
            None => false,
        };
        if !delivered {
            mailbox.subscriber = None;
        }
        Ok(key)
    }

    async fn watch_mailbox(&self, owner: &PeerId) -> Result<mpsc::UnboundedReceiver<MailboxEntry>> {
        let mut mailbox = self
            .inner
            .mailboxes
            .get_mut(owner)
            .ok_or_else(|| SignalError::NotRegistered(owner.clone()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for (key, envelope) in &mailbox.pending {
            let _ = tx.send(MailboxEntry {
                key: *key,
                envelope: envelope.clone(),
            });
        }
        mailbox.subscriber = Some(tx);
        Ok(rx)
    }

    async fn ack(&self, owner: &PeerId, key: MessageKey) -> Result<()> {
        if let Some(mut mailbox) = self.inner.mailboxes.get_mut(owner) {
            mailbox.pending.remove(&key);
        }
        Ok(())
    }
}
