use crate::media::LocalStream;
use crate::transport::{
    PeerTransport, RemoteStream, TransportEvent, TransportFactory, TransportSettings,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use copresence_core::{IceCandidate, SdpType, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_remote::TrackRemote;

/// Creates [`RtcTransport`]s backed by the `webrtc` crate.
#[derive(Debug, Clone, Default)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        settings: TransportSettings,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        Ok(Box::new(RtcTransport::new(settings, events).await?))
    }
}

pub struct RtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<RTCDataChannel>,
}

impl RtcTransport {
    pub async fn new(
        settings: TransportSettings,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: settings
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!(?state, "peer connection state changed");
                    let event = match state {
                        RTCPeerConnectionState::Connected => TransportEvent::Attached,
                        RTCPeerConnectionState::Failed => {
                            TransportEvent::Failed("peer connection failed".to_owned())
                        }
                        RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Closed => {
                            TransportEvent::Closed
                        }
                        _ => return,
                    };
                    let _ = tx.send(event).await;
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mline_index: init.sdp_mline_index,
                    sdp_mid: init.sdp_mid,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(candidate)).await;
            })
        }));

        let track_tx = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let stream = RemoteStream {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        kind: track.kind().to_string(),
                        track: Some(track),
                    };
                    debug!(stream = %stream.stream_id, kind = %stream.kind, "remote track");
                    let _ = tx.send(TransportEvent::RemoteStream(stream)).await;
                })
            },
        ));

        // The remote side sends on the channel it created; we only read from it.
        let dc_tx = events.clone();
        peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            Box::pin(async move {
                debug!(label = channel.label(), "remote data channel");
                channel.on_message(Box::new(move |msg: DataChannelMessage| {
                    let tx = tx.clone();
                    Box::pin(async move {
                        let bytes = Bytes::from(msg.data.to_vec());
                        let _ = tx.send(TransportEvent::Message(bytes)).await;
                    })
                }));
            })
        }));

        let data_channel = peer_connection
            .create_data_channel(&settings.data_channel_label, None)
            .await
            .context("Failed to create data channel")?;

        Ok(Self {
            peer_connection,
            data_channel,
        })
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    Ok(match description.kind {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
    })
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn attach_local_media(&self, stream: &LocalStream) -> Result<()> {
        for track in stream.tracks() {
            self.peer_connection
                .add_track(track.clone())
                .await
                .with_context(|| format!("Failed to attach track of stream {}", stream.id()))?;
        }
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<bool> {
        if self.data_channel.ready_state() != RTCDataChannelState::Open {
            return Ok(false);
        }
        self.data_channel.send(&data).await?;
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        let _ = self.data_channel.close().await;
        self.peer_connection.close().await?;
        Ok(())
    }
}
