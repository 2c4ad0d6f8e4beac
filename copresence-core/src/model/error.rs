use thiserror::Error;

/// Malformed data crossing the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("signal envelope carries no payload")]
    MissingPayload,

    #[error("signal envelope carries more than one payload")]
    AmbiguousPayload,

    #[error("unknown session description type '{0}'")]
    UnknownSdpType(String),
}
