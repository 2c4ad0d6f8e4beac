use crate::error::{Result, SignalError};
use crate::store::{Lease, PresenceStore};
use async_trait::async_trait;
use copresence_core::protocol::{
    MailboxEntry, MessageKey, RelayFailure, RelayFrame, RelayOp, RelayReply, RelayRequest,
};
use copresence_core::{
    Directory, DirectoryChange, PeerId, PresenceRecord, RecordPatch, RoomId, SignalEnvelope,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const DEFAULT_CHANGE_CAPACITY: usize = 256;

type PendingReply = oneshot::Sender<std::result::Result<RelayReply, RelayFailure>>;

/// [`PresenceStore`] backed by a relay server over a WebSocket.
///
/// One connection carries one registration: releasing the lease closes the
/// socket and the relay withdraws the peer.
pub struct RelayStore {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<Message>,
}

struct Shared {
    pending: DashMap<u64, PendingReply>,
    next_id: AtomicU64,
    closed: AtomicBool,
    directory_watched: AtomicBool,
    identity: OnceLock<PeerId>,
    changes: Mutex<Option<broadcast::Sender<DirectoryChange>>>,
    mailbox: Mutex<Option<mpsc::UnboundedSender<MailboxEntry>>>,
}

impl Shared {
    fn dispatch(&self, text: &str) {
        let frame: RelayFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "malformed relay frame");
                return;
            }
        };

        match frame {
            RelayFrame::Reply { id, result } => match self.pending.remove(&id) {
                Some((_, reply)) => {
                    let _ = reply.send(result);
                }
                None => debug!(id, "reply for unknown request"),
            },
            RelayFrame::Change { change } => {
                if let Some(changes) = self.changes.lock().as_ref() {
                    let _ = changes.send(change);
                }
            }
            RelayFrame::Mail { entry } => {
                let mut mailbox = self.mailbox.lock();
                let delivered = match mailbox.as_ref() {
                    Some(tx) => tx.send(entry).is_ok(),
                    None => false,
                };
                if !delivered {
                    *mailbox = None;
                }
            }
        }
    }

    fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.clear();
        self.changes.lock().take();
        self.mailbox.lock().take();
        info!("relay connection closed");
    }
}

impl RelayStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| SignalError::Relay(e.to_string()))?;
        info!(%url, "connected to relay");

        let (mut sink, mut stream) = socket.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (changes, _) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);

        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            directory_watched: AtomicBool::new(false),
            identity: OnceLock::new(),
            changes: Mutex::new(Some(changes)),
            mailbox: Mutex::new(None),
        });

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "relay write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = shared.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => reader.dispatch(&text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "relay read failed");
                        break;
                    }
                }
            }
            reader.disconnect();
        });

        Ok(Self { shared, outgoing })
    }

    async fn request(&self, op: RelayOp) -> Result<RelayReply> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let name = op.name();
        let text = serde_json::to_string(&RelayRequest { id, op })
            .map_err(|e| SignalError::Relay(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);
        if self.shared.closed.load(Ordering::SeqCst) || self.outgoing.send(Message::Text(text)).is_err()
        {
            self.shared.pending.remove(&id);
            return Err(SignalError::Closed);
        }
        debug!(id, op = name, "relay request sent");

        match rx.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(failure)) => Err(SignalError::from_relay(failure, self.shared.identity.get())),
            Err(_) => Err(SignalError::Closed),
        }
    }

    async fn request_done(&self, op: RelayOp) -> Result<()> {
        let name = op.name();
        match self.request(op).await? {
            RelayReply::Done => Ok(()),
            other => Err(unexpected(name, other)),
        }
    }
}

fn unexpected(op: &str, reply: RelayReply) -> SignalError {
    SignalError::Relay(format!("unexpected reply to {}: {:?}", op, reply))
}

#[async_trait]
impl PresenceStore for RelayStore {
    async fn register(&self, record: PresenceRecord) -> Result<Lease> {
        let peer_id = record.peer_id.clone();
        self.request_done(RelayOp::Register { record }).await?;
        let _ = self.shared.identity.set(peer_id.clone());

        let outgoing = self.outgoing.clone();
        Ok(Lease::new(peer_id, move || {
            let _ = outgoing.send(Message::Close(None));
        }))
    }

    async fn update(&self, peer_id: &PeerId, patch: RecordPatch) -> Result<()> {
        self.request_done(RelayOp::Update {
            peer_id: peer_id.clone(),
            patch,
        })
        .await
    }

    async fn record(&self, peer_id: &PeerId) -> Result<Option<PresenceRecord>> {
        match self
            .request(RelayOp::Record {
                peer_id: peer_id.clone(),
            })
            .await?
        {
            RelayReply::Record(record) => Ok(record),
            other => Err(unexpected("record", other)),
        }
    }

    async fn directory(&self) -> Result<Directory> {
        match self.request(RelayOp::Directory).await? {
            RelayReply::Directory(directory) => Ok(directory),
            other => Err(unexpected("directory", other)),
        }
    }

    async fn watch_directory(&self) -> Result<broadcast::Receiver<DirectoryChange>> {
        let rx = self
            .shared
            .changes
            .lock()
            .as_ref()
            .map(|changes| changes.subscribe())
            .ok_or(SignalError::Closed)?;

        if !self.shared.directory_watched.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.request_done(RelayOp::WatchDirectory).await {
                self.shared.directory_watched.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(rx)
    }

    async fn claim_room(
        &self,
        initiator: &PeerId,
        target: &PeerId,
        room_id: &RoomId,
    ) -> Result<()> {
        self.request_done(RelayOp::ClaimRoom {
            initiator: initiator.clone(),
            target: target.clone(),
            room_id: room_id.clone(),
        })
        .await
    }

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool> {
        match self
            .request(RelayOp::RoomExists {
                room_id: room_id.clone(),
            })
            .await?
        {
            RelayReply::Exists(exists) => Ok(exists),
            other => Err(unexpected("room_exists", other)),
        }
    }

    async fn join_room(&self, peer_id: &PeerId, room_id: &RoomId) -> Result<Option<RoomId>> {
        match self
            .request(RelayOp::JoinRoom {
                peer_id: peer_id.clone(),
                room_id: room_id.clone(),
            })
            .await?
        {
            RelayReply::Room(previous) => Ok(previous),
            other => Err(unexpected("join_room", other)),
        }
    }

    async fn leave_room(&self, peer_id: &PeerId) -> Result<RoomId> {
        match self
            .request(RelayOp::LeaveRoom {
                peer_id: peer_id.clone(),
            })
            .await?
        {
            RelayReply::Room(Some(room_id)) => Ok(room_id),
            other => Err(unexpected("leave_room", other)),
        }
    }

    async fn push(&self, target: &PeerId, envelope: SignalEnvelope) -> Result<MessageKey> {
        match self
            .request(RelayOp::Push {
                target: target.clone(),
                envelope,
            })
            .await?
        {
            RelayReply::Key(key) => Ok(key),
            other => Err(unexpected("push", other)),
        }
    }

    async fn watch_mailbox(&self, owner: &PeerId) -> Result<mpsc::UnboundedReceiver<MailboxEntry>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.mailbox.lock() = Some(tx);
        self.request_done(RelayOp::WatchMailbox {
            owner: owner.clone(),
        })
        .await?;
        Ok(rx)
    }

    async fn ack(&self, owner: &PeerId, key: MessageKey) -> Result<()> {
        self.request_done(RelayOp::Ack {
            owner: owner.clone(),
            key,
        })
        .await
    }
}
