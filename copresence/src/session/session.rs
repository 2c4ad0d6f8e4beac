use crate::session::SessionBuilder;
use copresence_core::{Directory, PeerId, RoomId};
use copresence_rtc::{ConnectionManager, MediaCache, NegotiationError, Result, SessionEvent};
use copresence_signal::{PresenceStore, SignalChannel};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// One peer's presence, rooms and connections.
pub struct Session {
    signal: Arc<SignalChannel>,
    manager: ConnectionManager,
    media: Arc<MediaCache>,
    closed: AtomicBool,
}

impl Session {
    pub fn builder(store: Arc<dyn PresenceStore>) -> SessionBuilder {
        SessionBuilder::new(store)
    }

    pub(crate) fn new(
        signal: Arc<SignalChannel>,
        manager: ConnectionManager,
        media: Arc<MediaCache>,
    ) -> Self {
        Self {
            signal,
            manager,
            media,
            closed: AtomicBool::new(false),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        self.signal.local_id()
    }

    pub fn signal(&self) -> &SignalChannel {
        &self.signal
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn media(&self) -> &MediaCache {
        &self.media
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.manager.subscribe()
    }

    pub async fn directory(&self) -> Result<Directory> {
        Ok(self.signal.directory().await?)
    }

    /// Claims a new room holding the local peer and `target`.
    pub async fn create_room(&self, target: &PeerId) -> Result<RoomId> {
        Ok(self.signal.create_room(target).await?)
    }

    /// Joins `room_id`, then connects to every other occupant in turn.
    pub async fn join_room_and_connect(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<(PeerId, Result<()>)>> {
        self.signal.join_room(room_id).await?;
        let others: Vec<PeerId> = self
            .signal
            .get_peers_in_room(room_id)
            .await?
            .into_iter()
            .filter(|peer| peer != self.local_id())
            .collect();
        info!(room = %room_id, peers = others.len(), "connecting to room");
        Ok(self.manager.connect_all(others).await)
    }

    /// Leaves the current room and hangs up on everyone still in it.
    pub async fn leave_room(&self) -> Result<RoomId> {
        let record = self.signal.local_record().await?;
        let room_id = record.room_id.ok_or(NegotiationError::NotInRoom)?;
        let roommates = self.signal.get_peers_in_room(&room_id).await?;

        self.signal.leave_room().await?;
        for peer in roommates.iter().filter(|peer| *peer != self.local_id()) {
            self.manager.disconnect(peer).await?;
        }
        Ok(room_id)
    }

    /// Closes every connection, releases local media and withdraws presence.
    /// Later calls do nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.manager.shutdown().await {
            warn!(error = %e, "connection manager already stopped");
        }
        self.media.release().await;
        self.signal.unregister();
        info!(peer = %self.local_id(), "session closed");
    }
}
