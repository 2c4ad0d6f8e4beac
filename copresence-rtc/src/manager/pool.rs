use crate::negotiator::NegotiationState;
use copresence_core::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListeningSlot {
    pub state: NegotiationState,
    /// The inbound caller the listener has adopted, if any.
    pub bound_to: Option<PeerId>,
}

/// Point-in-time view of a manager's negotiators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub listening: ListeningSlot,
    /// Outbound attempts still negotiating, sorted.
    pub outbound: Vec<PeerId>,
    /// Connected peers, sorted.
    pub established: Vec<PeerId>,
}

impl PoolSnapshot {
    pub fn is_established(&self, peer_id: &PeerId) -> bool {
        self.established.binary_search(peer_id).is_ok()
    }

    pub fn is_idle(&self) -> bool {
        self.listening.bound_to.is_none() && self.outbound.is_empty() && self.established.is_empty()
    }
}
