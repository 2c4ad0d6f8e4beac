mod loopback;
mod rtc_transport;
mod transport_event;

pub use loopback::LoopbackNetwork;
pub use rtc_transport::{RtcTransport, RtcTransportFactory};
pub use transport_event::{RemoteStream, TransportEvent};

use crate::media::LocalStream;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use copresence_core::{IceCandidate, IceServerConfig, SessionDescription};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub ice_servers: Vec<IceServerConfig>,
    pub data_channel_label: String,
}

/// One peer connection. Asynchronous outcomes (local candidates, media
/// attachment, inbound data, failure) arrive on the event channel handed to
/// [`TransportFactory::create`].
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn attach_local_media(&self, stream: &LocalStream) -> Result<()>;

    /// Returns `false` when the data channel is not open yet.
    async fn send(&self, data: Bytes) -> Result<bool>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn create(
        &self,
        settings: TransportSettings,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
