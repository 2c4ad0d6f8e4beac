use crate::relay::RelayService;
use axum::extract::ws::Message;
use copresence_core::protocol::{
    MailboxEntry, RelayFailure, RelayFrame, RelayOp, RelayReply, RelayRequest,
};
use copresence_core::{DirectoryChange, PeerId};
use copresence_signal::{Lease, PresenceStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type OpResult = Result<RelayReply, RelayFailure>;

/// Server side of one relay client. Holds the client's registration lease,
/// so dropping the connection withdraws the peer.
pub(crate) struct RelayConnection {
    id: u64,
    service: RelayService,
    out: mpsc::UnboundedSender<Message>,
    lease: Option<Lease>,
    forwarders: Vec<JoinHandle<()>>,
    watching_directory: bool,
    watching_mailbox: bool,
}

impl RelayConnection {
    pub(crate) fn new(id: u64, service: RelayService, out: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            service,
            out,
            lease: None,
            forwarders: Vec::new(),
            watching_directory: false,
            watching_mailbox: false,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) async fn handle_text(&mut self, text: &str) {
        let request: RelayRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                warn!(connection = self.id, error = %e, "invalid relay request");
                return;
            }
        };

        let name = request.op.name();
        let result = self.execute(request.op).await;
        match &result {
            Ok(_) => debug!(connection = self.id, id = request.id, op = name, "request served"),
            Err(failure) => {
                debug!(connection = self.id, id = request.id, op = name, %failure, "request refused")
            }
        }
        send_frame(&self.out, &RelayFrame::Reply {
            id: request.id,
            result,
        });
    }

    fn identity(&self) -> Option<&PeerId> {
        self.lease.as_ref().map(Lease::peer_id)
    }

    /// Only the peer registered on this connection may act as `peer_id`.
    fn require(&self, peer_id: &PeerId) -> Result<(), RelayFailure> {
        match self.identity() {
            None => Err(RelayFailure::NotRegistered),
            Some(identity) if identity == peer_id => Ok(()),
            Some(_) => Err(RelayFailure::Forbidden),
        }
    }

    async fn execute(&mut self, op: RelayOp) -> OpResult {
        let store = self.service.store().clone();

        match op {
            RelayOp::Register { record } => {
                if self.lease.is_some() {
                    return Err(RelayFailure::Invalid(
                        "connection already registered a peer".to_owned(),
                    ));
                }
                let peer_id = record.peer_id.clone();
                let lease = store.register(record).await?;
                info!(connection = self.id, peer = %peer_id, "peer registered");
                self.service.track(peer_id, self.id);
                self.lease = Some(lease);
                Ok(RelayReply::Done)
            }
            RelayOp::Update { peer_id, patch } => {
                self.require(&peer_id)?;
                if patch.touches_room() {
                    return Err(RelayFailure::Invalid(
                        "room membership changes through join_room or leave_room".to_owned(),
                    ));
                }
                store.update(&peer_id, patch).await?;
                Ok(RelayReply::Done)
            }
            RelayOp::Record { peer_id } => Ok(RelayReply::Record(store.record(&peer_id).await?)),
            RelayOp::Directory => Ok(RelayReply::Directory(store.directory().await?)),
            RelayOp::WatchDirectory => {
                if !self.watching_directory {
                    let changes = store.watch_directory().await?;
                    self.forward_changes(changes);
                    self.watching_directory = true;
                }
                Ok(RelayReply::Done)
            }
            RelayOp::ClaimRoom {
                initiator,
                target,
                room_id,
            } => {
                self.require(&initiator)?;
                store.claim_room(&initiator, &target, &room_id).await?;
                Ok(RelayReply::Done)
            }
            RelayOp::RoomExists { room_id } => {
                Ok(RelayReply::Exists(store.room_exists(&room_id).await?))
            }
            RelayOp::JoinRoom { peer_id, room_id } => {
                self.require(&peer_id)?;
                Ok(RelayReply::Room(store.join_room(&peer_id, &room_id).await?))
            }
            RelayOp::LeaveRoom { peer_id } => {
                self.require(&peer_id)?;
                Ok(RelayReply::Room(Some(store.leave_room(&peer_id).await?)))
            }
            RelayOp::Push { target, envelope } => {
                self.require(&envelope.sender_id)?;
                Ok(RelayReply::Key(store.push(&target, envelope).await?))
            }
            RelayOp::WatchMailbox { owner } => {
                self.require(&owner)?;
                if self.watching_mailbox {
                    return Err(RelayFailure::Invalid("mailbox already watched".to_owned()));
                }
                let entries = store.watch_mailbox(&owner).await?;
                self.forward_mail(entries);
                self.watching_mailbox = true;
                Ok(RelayReply::Done)
            }
            RelayOp::Ack { owner, key } => {
                self.require(&owner)?;
                store.ack(&owner, key).await?;
                Ok(RelayReply::Done)
            }
        }
    }

    fn forward_changes(&mut self, mut changes: broadcast::Receiver<DirectoryChange>) {
        let out = self.out.clone();
        let id = self.id;
        self.forwarders.push(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if !send_frame(&out, &RelayFrame::Change { change }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(connection = id, skipped, "directory watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    fn forward_mail(&mut self, mut entries: mpsc::UnboundedReceiver<MailboxEntry>) {
        let out = self.out.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(entry) = entries.recv().await {
                if !send_frame(&out, &RelayFrame::Mail { entry }) {
                    break;
                }
            }
        }));
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        if let Some(peer_id) = self.identity() {
            info!(connection = self.id, peer = %peer_id, "peer withdrawn");
            self.service.untrack(peer_id, self.id);
        }
    }
}

fn send_frame(out: &mpsc::UnboundedSender<Message>, frame: &RelayFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => out.send(Message::Text(json.into())).is_ok(),
        Err(e) => {
            error!("Failed to serialize relay frame: {}", e);
            false
        }
    }
}
