use crate::model::error::ProtocolError;
use crate::model::peer::PeerId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Correlation id chosen by the caller for one negotiation attempt and echoed
/// by the callee in every message of that attempt.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    #[serde(alias = "url", deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl FromStr for SdpType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            other => Err(ProtocolError::UnknownSdpType(other.to_owned())),
        }
    }
}

impl TryFrom<String> for SdpType {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mline_index: None,
            sdp_mid: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// The callee is already negotiating with someone else.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    Offer(String),
    Answer(String),
    IceCandidate(IceCandidate),
    Reject(RejectReason),
}

impl SignalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer(_) => "offer",
            SignalPayload::Answer(_) => "answer",
            SignalPayload::IceCandidate(_) => "ice",
            SignalPayload::Reject(_) => "reject",
        }
    }
}

/// One message in a peer's mailbox.
///
/// On the wire the payload is discriminated by which of `sdp`, `ice` or
/// `reject` is present; in memory it is a tagged [`SignalPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct SignalEnvelope {
    pub sender_id: PeerId,
    pub attempt: Option<AttemptId>,
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn new(sender_id: PeerId, attempt: Option<AttemptId>, payload: SignalPayload) -> Self {
        Self {
            sender_id,
            attempt,
            payload,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireReject {
    reason: RejectReason,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    sender_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attempt_id: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sdp: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ice: Option<IceCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reject: Option<WireReject>,
}

impl TryFrom<WireEnvelope> for SignalEnvelope {
    type Error = ProtocolError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let payload = match (wire.sdp, wire.ice, wire.reject) {
            (Some(desc), None, None) => match desc.kind {
                SdpType::Offer => SignalPayload::Offer(desc.sdp),
                SdpType::Answer => SignalPayload::Answer(desc.sdp),
            },
            (None, Some(candidate), None) => SignalPayload::IceCandidate(candidate),
            (None, None, Some(reject)) => SignalPayload::Reject(reject.reason),
            (None, None, None) => return Err(ProtocolError::MissingPayload),
            _ => return Err(ProtocolError::AmbiguousPayload),
        };

        Ok(Self {
            sender_id: wire.sender_id,
            attempt: wire.attempt_id,
            payload,
        })
    }
}

impl From<SignalEnvelope> for WireEnvelope {
    fn from(envelope: SignalEnvelope) -> Self {
        let mut wire = WireEnvelope {
            sender_id: envelope.sender_id,
            attempt_id: envelope.attempt,
            sdp: None,
            ice: None,
            reject: None,
        };
        match envelope.payload {
            SignalPayload::Offer(sdp) => wire.sdp = Some(SessionDescription::offer(sdp)),
            SignalPayload::Answer(sdp) => wire.sdp = Some(SessionDescription::answer(sdp)),
            SignalPayload::IceCandidate(candidate) => wire.ice = Some(candidate),
            SignalPayload::Reject(reason) => wire.reject = Some(WireReject { reason }),
        }
        wire
    }
}
