use crate::error::NegotiationError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    /// Fetching ICE configuration, local media and a transport.
    Created,
    /// Idle and able to either call or answer.
    Ready,
    Offering,
    Answering,
    Connected,
    Closed,
    Error(NegotiationError),
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Error(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            NegotiationState::Created => "created",
            NegotiationState::Ready => "ready",
            NegotiationState::Offering => "offering",
            NegotiationState::Answering => "answering",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
            NegotiationState::Error(_) => "error",
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Error(e) => write!(f, "error: {}", e),
            other => f.write_str(other.name()),
        }
    }
}
