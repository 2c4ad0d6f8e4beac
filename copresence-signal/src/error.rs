use copresence_core::PeerId;
use copresence_core::protocol::RelayFailure;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("peer {0} already belongs to a room")]
    Conflict(PeerId),

    #[error("peer is not in a room")]
    NotInRoom,

    #[error("peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("peer {0} is not registered")]
    NotRegistered(PeerId),

    #[error("peer {0} is already registered")]
    AlreadyRegistered(PeerId),

    #[error("{0} can only be watched once per channel")]
    AlreadyWatched(&'static str),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("presence store is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SignalError>;

impl SignalError {
    /// Error returned by a relay to a connection registered as `identity`.
    pub fn from_relay(failure: RelayFailure, identity: Option<&PeerId>) -> Self {
        match (failure, identity) {
            (RelayFailure::Conflict(peer), _) => SignalError::Conflict(peer),
            (RelayFailure::NotInRoom, _) => SignalError::NotInRoom,
            (RelayFailure::PeerUnavailable(peer), _) => SignalError::PeerUnavailable(peer),
            (RelayFailure::NotRegistered, Some(peer)) => SignalError::NotRegistered(peer.clone()),
            (other, _) => SignalError::Relay(other.to_string()),
        }
    }
}

impl From<SignalError> for RelayFailure {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::Conflict(peer) => RelayFailure::Conflict(peer),
            SignalError::NotInRoom => RelayFailure::NotInRoom,
            SignalError::PeerUnavailable(peer) => RelayFailure::PeerUnavailable(peer),
            SignalError::NotRegistered(_) => RelayFailure::NotRegistered,
            SignalError::AlreadyRegistered(_) => RelayFailure::Forbidden,
            other => RelayFailure::Internal(other.to_string()),
        }
    }
}
