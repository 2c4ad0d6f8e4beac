use crate::transport::RemoteStream;
use bytes::Bytes;
use copresence_core::{Directory, PeerId, PeerLeave};

/// Everything an application observes about its session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A connection reached `Connected` and joined the established set.
    Open { peer_id: PeerId },

    /// An established connection went away.
    Close { peer_id: PeerId },

    /// Data channel message from an established peer.
    Data { peer_id: PeerId, data: Bytes },

    RemoteStream {
        peer_id: PeerId,
        stream: RemoteStream,
    },

    /// Full presence snapshot after any directory change.
    UsersChange(Directory),

    /// A roommate left the local peer's room.
    PeerLeave(PeerLeave),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Open { .. } => "open",
            SessionEvent::Close { .. } => "close",
            SessionEvent::Data { .. } => "data",
            SessionEvent::RemoteStream { .. } => "remotestream",
            SessionEvent::UsersChange(_) => "userschange",
            SessionEvent::PeerLeave(_) => "peerleave",
        }
    }
}
