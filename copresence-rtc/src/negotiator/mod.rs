mod negotiation_state;
mod negotiator;
mod negotiator_command;

pub use negotiation_state::NegotiationState;
pub use negotiator::{NegotiatorContext, NegotiatorHandle, NegotiatorId};

pub(crate) use negotiator::{attempt_matches, spawn_negotiator};
pub(crate) use negotiator_command::{NegotiatorCommand, NegotiatorEvent};
