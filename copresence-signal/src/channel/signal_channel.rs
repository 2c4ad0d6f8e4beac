use crate::channel::RoomRegistry;
use crate::channel::watchers;
use crate::error::{Result, SignalError};
use crate::store::{Lease, PresenceStore};
use copresence_core::{
    AttemptId, Directory, PeerId, PeerLeave, PresenceRecord, RecordPatch, RoomId,
    SignalEnvelope, SignalPayload,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

const WATCH_CAPACITY: usize = 64;

/// The local peer's handle on the presence store: its record, its rooms and
/// its mailbox.
///
/// Each of [`watch_presence`](Self::watch_presence),
/// [`watch_departure`](Self::watch_departure) and
/// [`inbound`](Self::inbound) may be taken once.
pub struct SignalChannel {
    store: Arc<dyn PresenceStore>,
    rooms: RoomRegistry,
    local_id: PeerId,
    lease: Mutex<Option<Lease>>,
    presence_taken: AtomicBool,
    departure_taken: AtomicBool,
    inbound_taken: AtomicBool,
}

impl SignalChannel {
    /// Publishes a fresh, available record under a new peer id.
    pub async fn register(store: Arc<dyn PresenceStore>, username: Option<String>) -> Result<Self> {
        let local_id = PeerId::new();
        let lease = store
            .register(PresenceRecord::new(local_id.clone(), username))
            .await?;
        info!(peer = %local_id, "signal channel registered");

        Ok(Self {
            rooms: RoomRegistry::new(store.clone()),
            store,
            local_id,
            lease: Mutex::new(Some(lease)),
            presence_taken: AtomicBool::new(false),
            departure_taken: AtomicBool::new(false),
            inbound_taken: AtomicBool::new(false),
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn store(&self) -> &Arc<dyn PresenceStore> {
        &self.store
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub async fn local_record(&self) -> Result<PresenceRecord> {
        self.store
            .record(&self.local_id)
            .await?
            .ok_or_else(|| SignalError::NotRegistered(self.local_id.clone()))
    }

    pub async fn directory(&self) -> Result<Directory> {
        self.store.directory().await
    }

    pub async fn set_availability(&self, available: bool) -> Result<()> {
        self.store
            .update(&self.local_id, RecordPatch::availability(available))
            .await
    }

    pub async fn set_username(&self, username: impl Into<String>) -> Result<()> {
        self.store
            .update(&self.local_id, RecordPatch::username(username))
            .await
    }

    /// Directory snapshots: one immediately, then one after each change.
    pub async fn watch_presence(&self) -> Result<mpsc::Receiver<Directory>> {
        take_once(&self.presence_taken, "presence")?;
        let changes = self.store.watch_directory().await?;
        let (tx, rx) = mpsc::channel(WATCH_CAPACITY);
        watchers::spawn_presence(self.store.clone(), changes, tx);
        Ok(rx)
    }

    /// Roommates leaving the local peer's current room.
    pub async fn watch_departure(&self) -> Result<mpsc::Receiver<PeerLeave>> {
        take_once(&self.departure_taken, "departure")?;
        let changes = self.store.watch_directory().await?;
        let (tx, rx) = mpsc::channel(WATCH_CAPACITY);
        watchers::spawn_departures(self.store.clone(), self.local_id.clone(), changes, tx);
        Ok(rx)
    }

    /// Signal messages addressed to the local peer, each delivered once and
    /// removed from the mailbox.
    pub async fn inbound(&self) -> Result<mpsc::Receiver<SignalEnvelope>> {
        take_once(&self.inbound_taken, "mailbox")?;
        let entries = self.store.watch_mailbox(&self.local_id).await?;
        let (tx, rx) = mpsc::channel(WATCH_CAPACITY);
        watchers::spawn_inbound(self.store.clone(), self.local_id.clone(), entries, tx);
        Ok(rx)
    }

    pub async fn send(
        &self,
        target: &PeerId,
        attempt: Option<AttemptId>,
        payload: SignalPayload,
    ) -> Result<()> {
        let kind = payload.kind();
        let envelope = SignalEnvelope::new(self.local_id.clone(), attempt, payload);
        let key = self.store.push(target, envelope).await?;
        debug!(target = %target.short(), kind, key, "signal sent");
        Ok(())
    }

    pub async fn create_room(&self, target: &PeerId) -> Result<RoomId> {
        self.rooms.create(&self.local_id, target).await
    }

    pub async fn join_room(&self, room_id: &RoomId) -> Result<()> {
        self.rooms.join(&self.local_id, room_id).await
    }

    pub async fn leave_room(&self) -> Result<RoomId> {
        self.rooms.leave(&self.local_id).await
    }

    pub async fn get_peers_in_room(&self, room_id: &RoomId) -> Result<Vec<PeerId>> {
        self.rooms.peers_in(room_id).await
    }

    /// Withdraws the local record now instead of when the channel drops.
    pub fn unregister(&self) {
        let lease = self.lease.lock().take();
        if let Some(lease) = lease {
            info!(peer = %self.local_id, "signal channel unregistered");
            lease.release();
        }
    }
}

fn take_once(flag: &AtomicBool, what: &'static str) -> Result<()> {
    if flag.swap(true, Ordering::SeqCst) {
        return Err(SignalError::AlreadyWatched(what));
    }
    Ok(())
}
