use bytes::Bytes;
use copresence_core::IceCandidate;
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Events a transport reports to the negotiator that owns it.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local candidate to relay to the remote peer.
    CandidateGenerated(IceCandidate),

    /// Connectivity is up and media flows.
    Attached,

    RemoteStream(RemoteStream),

    /// Data channel message from the remote peer.
    Message(Bytes),

    Failed(String),

    /// The remote side hung up or the connection was torn down.
    Closed,
}

/// A track received from the remote peer.
#[derive(Clone)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub kind: String,
    pub track: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("stream_id", &self.stream_id)
            .field("track_id", &self.track_id)
            .field("kind", &self.kind)
            .finish()
    }
}
