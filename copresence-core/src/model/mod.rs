mod error;
mod peer;
mod presence;
mod room;
mod signaling;

pub use error::ProtocolError;
pub use peer::PeerId;
pub use presence::{Directory, DirectoryChange, PeerLeave, PresenceRecord, RecordPatch};
pub use room::RoomId;
pub use signaling::{
    AttemptId, IceCandidate, IceServerConfig, RejectReason, SdpType, SessionDescription,
    SignalEnvelope, SignalPayload,
};
