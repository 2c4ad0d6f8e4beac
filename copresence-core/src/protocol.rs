//! Frames exchanged between a relay client and the relay server.
//!
//! Every client request carries an id that the server echoes in its
//! [`RelayFrame::Reply`]. Directory changes and mailbox entries are pushed
//! unprompted once the client has asked to watch them.

use crate::model::{
    Directory, DirectoryChange, PeerId, PresenceRecord, RecordPatch, RoomId, SignalEnvelope,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic key of a message inside a mailbox.
pub type MessageKey = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub key: MessageKey,
    pub envelope: SignalEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRequest {
    pub id: u64,
    pub op: RelayOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum RelayOp {
    Register {
        record: PresenceRecord,
    },
    Update {
        peer_id: PeerId,
        patch: RecordPatch,
    },
    Record {
        peer_id: PeerId,
    },
    Directory,
    WatchDirectory,
    ClaimRoom {
        initiator: PeerId,
        target: PeerId,
        room_id: RoomId,
    },
    RoomExists {
        room_id: RoomId,
    },
    JoinRoom {
        peer_id: PeerId,
        room_id: RoomId,
    },
    LeaveRoom {
        peer_id: PeerId,
    },
    Push {
        target: PeerId,
        envelope: SignalEnvelope,
    },
    WatchMailbox {
        owner: PeerId,
    },
    Ack {
        owner: PeerId,
        key: MessageKey,
    },
}

impl RelayOp {
    pub fn name(&self) -> &'static str {
        match self {
            RelayOp::Register { .. } => "register",
            RelayOp::Update { .. } => "update",
            RelayOp::Record { .. } => "record",
            RelayOp::Directory => "directory",
            RelayOp::WatchDirectory => "watch_directory",
            RelayOp::ClaimRoom { .. } => "claim_room",
            RelayOp::RoomExists { .. } => "room_exists",
            RelayOp::JoinRoom { .. } => "join_room",
            RelayOp::LeaveRoom { .. } => "leave_room",
            RelayOp::Push { .. } => "push",
            RelayOp::WatchMailbox { .. } => "watch_mailbox",
            RelayOp::Ack { .. } => "ack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "d", rename_all = "snake_case")]
pub enum RelayReply {
    Done,
    Record(Option<PresenceRecord>),
    Directory(Directory),
    Exists(bool),
    Room(Option<RoomId>),
    Key(MessageKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "code", content = "d", rename_all = "snake_case")]
pub enum RelayFailure {
    #[error("peer {0} already belongs to a room")]
    Conflict(PeerId),

    #[error("peer is not in a room")]
    NotInRoom,

    #[error("peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("connection has not registered a peer")]
    NotRegistered,

    #[error("operation is not permitted for this connection")]
    Forbidden,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("relay error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RelayFrame {
    Reply {
        id: u64,
        result: Result<RelayReply, RelayFailure>,
    },
    Change {
        change: DirectoryChange,
    },
    Mail {
        entry: MailboxEntry,
    },
}
