use copresence_core::PeerId;
use copresence_signal::SignalError;
use std::time::Duration;
use thiserror::Error;

/// Why a negotiation attempt ended in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("failed to fetch ICE configuration: {0}")]
    ConfigFetch(String),

    #[error("local media unavailable: {0}")]
    MediaAccess(String),

    #[error("signaling conflict: {0}")]
    SignalingConflict(String),

    #[error("session description rejected: {0}")]
    DescriptionRejected(String),

    #[error("failed to apply ICE candidate: {0}")]
    IceApply(String),

    #[error("peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("peer is not in a room")]
    NotInRoom,

    #[error("negotiation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("signaling failed: {0}")]
    Signaling(String),

    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NegotiationError>;

impl From<SignalError> for NegotiationError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::Conflict(peer) => {
                NegotiationError::SignalingConflict(format!("peer {} already belongs to a room", peer))
            }
            SignalError::NotInRoom => NegotiationError::NotInRoom,
            SignalError::PeerUnavailable(peer) => NegotiationError::PeerUnavailable(peer),
            other => NegotiationError::Signaling(other.to_string()),
        }
    }
}
