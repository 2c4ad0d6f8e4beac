use crate::error::NegotiationError;
use crate::negotiator::NegotiatorId;
use bytes::Bytes;
use copresence_core::{AttemptId, PeerId, SignalEnvelope};
use tokio::sync::oneshot;

pub(crate) enum NegotiatorCommand {
    /// Take the caller role towards `remote`.
    Connect { remote: PeerId, attempt: AttemptId },
    Signal(SignalEnvelope),
    Send(Bytes),
    Close(oneshot::Sender<()>),
}

/// Lifecycle notifications sent to the owning manager.
#[derive(Debug)]
pub(crate) enum NegotiatorEvent {
    Opened {
        id: NegotiatorId,
        remote: PeerId,
        attempt: Option<AttemptId>,
    },
    Failed {
        id: NegotiatorId,
        remote: Option<PeerId>,
        error: NegotiationError,
    },
    Closed {
        id: NegotiatorId,
        remote: Option<PeerId>,
    },
}
