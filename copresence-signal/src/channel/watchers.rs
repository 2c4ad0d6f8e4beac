use crate::store::PresenceStore;
use copresence_core::{Directory, DirectoryChange, PeerId, PeerLeave, SignalEnvelope};
use copresence_core::protocol::MailboxEntry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Sends a full snapshot now and again after every change.
pub(crate) fn spawn_presence(
    store: Arc<dyn PresenceStore>,
    mut changes: broadcast::Receiver<DirectoryChange>,
    tx: mpsc::Sender<Directory>,
) {
    tokio::spawn(async move {
        loop {
            match store.directory().await {
                Ok(directory) => {
                    if tx.send(directory).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "presence snapshot failed");
                    break;
                }
            }

            match changes.recv().await {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "presence watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("presence watcher stopped");
    });
}

/// Reports roommates whose record stops pointing at the local peer's room.
pub(crate) fn spawn_departures(
    store: Arc<dyn PresenceStore>,
    local: PeerId,
    mut changes: broadcast::Receiver<DirectoryChange>,
    tx: mpsc::Sender<PeerLeave>,
) {
    tokio::spawn(async move {
        loop {
            let change = match changes.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "departure watcher lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if change.peer_id() == &local {
                continue;
            }
            let Some(room_id) = change.departed_room() else {
                continue;
            };

            let own_room = match store.record(&local).await {
                Ok(Some(record)) => record.room_id,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read local record");
                    continue;
                }
            };
            if own_room.as_ref() != Some(room_id) {
                continue;
            }

            let leave = PeerLeave {
                peer_id: change.peer_id().clone(),
                room_id: room_id.clone(),
            };
            debug!(peer = %leave.peer_id.short(), room = %leave.room_id, "roommate left");
            if tx.send(leave).await.is_err() {
                break;
            }
        }
        debug!("departure watcher stopped");
    });
}

/// Acknowledges each mailbox entry before handing its envelope over.
pub(crate) fn spawn_inbound(
    store: Arc<dyn PresenceStore>,
    local: PeerId,
    mut entries: mpsc::UnboundedReceiver<MailboxEntry>,
    tx: mpsc::Sender<SignalEnvelope>,
) {
    tokio::spawn(async move {
        while let Some(entry) = entries.recv().await {
            if let Err(e) = store.ack(&local, entry.key).await {
                warn!(key = entry.key, error = %e, "failed to acknowledge message");
            }
            debug!(
                key = entry.key,
                sender = %entry.envelope.sender_id.short(),
                kind = entry.envelope.payload.kind(),
                "signal received"
            );
            if tx.send(entry.envelope).await.is_err() {
                break;
            }
        }
        debug!("inbound watcher stopped");
    });
}
