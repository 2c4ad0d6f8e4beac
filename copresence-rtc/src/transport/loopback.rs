use crate::media::LocalStream;
use crate::transport::{
    PeerTransport, RemoteStream, TransportEvent, TransportFactory, TransportSettings,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use copresence_core::{IceCandidate, SessionDescription};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const SDP_PREFIX: &str = "v=0 loopback ";
const CANDIDATES_PER_ENDPOINT: u64 = 2;

/// In-process [`TransportFactory`]. Endpoints find each other through the
/// endpoint id embedded in their session descriptions and attach once both
/// descriptions are set and a remote candidate has been applied.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Network>,
}

#[derive(Default)]
struct Network {
    endpoints: DashMap<u64, Arc<Endpoint>>,
    next_id: AtomicU64,
    reject_remote: AtomicBool,
    fail_create: AtomicBool,
}

struct Endpoint {
    id: u64,
    events: mpsc::Sender<TransportEvent>,
    state: Mutex<EndpointState>,
}

#[derive(Default)]
struct EndpointState {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    peer: Option<u64>,
    applied: Vec<IceCandidate>,
    media_tracks: usize,
    attached: bool,
    closed: bool,
}

fn description_for(id: u64) -> String {
    format!("{}{}", SDP_PREFIX, id)
}

fn endpoint_of(sdp: &str) -> Option<u64> {
    sdp.strip_prefix(SDP_PREFIX)?.trim().parse().ok()
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `set_remote_description` fail until switched back.
    pub fn reject_remote_descriptions(&self, reject: bool) {
        self.inner.reject_remote.store(reject, Ordering::SeqCst);
    }

    pub fn fail_transport_creation(&self, fail: bool) {
        self.inner.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn open_endpoints(&self) -> usize {
        self.inner.endpoints.len()
    }

    /// Candidates applied, in order, by the endpoint whose remote
    /// description is `remote_sdp`.
    pub fn applied_candidates(&self, remote_sdp: &str) -> Option<Vec<String>> {
        self.inner.endpoints.iter().find_map(|entry| {
            let state = entry.value().state.lock();
            match &state.remote {
                Some(remote) if remote.sdp == remote_sdp => Some(
                    state
                        .applied
                        .iter()
                        .map(|candidate| candidate.candidate.clone())
                        .collect(),
                ),
                _ => None,
            }
        })
    }
}

impl Network {
    fn endpoint(&self, id: u64) -> Option<Arc<Endpoint>> {
        self.endpoints.get(&id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl TransportFactory for LoopbackNetwork {
    async fn create(
        &self,
        _settings: TransportSettings,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        if self.inner.fail_create.load(Ordering::SeqCst) {
            bail!("loopback transport creation refused");
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let endpoint = Arc::new(Endpoint {
            id,
            events,
            state: Mutex::new(EndpointState::default()),
        });
        self.inner.endpoints.insert(id, endpoint.clone());
        debug!(endpoint = id, "loopback endpoint created");

        Ok(Box::new(LoopbackTransport {
            network: self.inner.clone(),
            endpoint,
        }))
    }
}

pub struct LoopbackTransport {
    network: Arc<Network>,
    endpoint: Arc<Endpoint>,
}

impl LoopbackTransport {
    async fn check_attached(&self) {
        let peer = {
            let mut state = self.endpoint.state.lock();
            if state.attached
                || state.closed
                || state.local.is_none()
                || state.remote.is_none()
                || state.applied.is_empty()
            {
                return;
            }
            state.attached = true;
            state.peer
        };
        debug!(endpoint = self.endpoint.id, "loopback endpoint attached");
        let _ = self.endpoint.events.send(TransportEvent::Attached).await;

        let Some(peer) = peer.and_then(|id| self.network.endpoint(id)) else {
            return;
        };
        let tracks = peer.state.lock().media_tracks;
        for n in 0..tracks {
            let stream = RemoteStream {
                stream_id: format!("loopback-{}", peer.id),
                track_id: format!("track-{}", n),
                kind: "audio".to_owned(),
                track: None,
            };
            let _ = self
                .endpoint
                .events
                .send(TransportEvent::RemoteStream(stream))
                .await;
        }
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn create_offer(&self) -> Result<String> {
        if self.endpoint.state.lock().closed {
            bail!("transport closed");
        }
        Ok(description_for(self.endpoint.id))
    }

    async fn create_answer(&self) -> Result<String> {
        if self.endpoint.state.lock().remote.is_none() {
            bail!("cannot answer without a remote offer");
        }
        Ok(description_for(self.endpoint.id))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.endpoint.state.lock().local = Some(description);

        let id = self.endpoint.id;
        for n in 1..=CANDIDATES_PER_ENDPOINT {
            let candidate = IceCandidate {
                candidate: format!(
                    "candidate:{}{} 1 udp 2130706431 127.0.0.1 {} typ host",
                    id,
                    n,
                    50_000 + id * CANDIDATES_PER_ENDPOINT + n
                ),
                sdp_mline_index: Some(0),
                sdp_mid: Some("0".to_owned()),
            };
            let _ = self
                .endpoint
                .events
                .send(TransportEvent::CandidateGenerated(candidate))
                .await;
        }

        self.check_attached().await;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if self.network.reject_remote.load(Ordering::SeqCst) {
            bail!("remote description rejected");
        }
        if !description.sdp.starts_with("v=0") {
            bail!("malformed session description");
        }
        {
            let mut state = self.endpoint.state.lock();
            state.peer = endpoint_of(&description.sdp);
            state.remote = Some(description);
        }
        self.check_attached().await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        {
            let mut state = self.endpoint.state.lock();
            if state.remote.is_none() {
                bail!("remote description not set");
            }
            state.applied.push(candidate);
        }
        self.check_attached().await;
        Ok(())
    }

    async fn attach_local_media(&self, stream: &LocalStream) -> Result<()> {
        self.endpoint.state.lock().media_tracks += stream.tracks().len();
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<bool> {
        let peer = {
            let state = self.endpoint.state.lock();
            if !state.attached || state.closed {
                return Ok(false);
            }
            state.peer
        };
        let Some(peer) = peer.and_then(|id| self.network.endpoint(id)) else {
            return Ok(false);
        };
        Ok(peer.events.send(TransportEvent::Message(data)).await.is_ok())
    }

    async fn close(&self) -> Result<()> {
        let peer = {
            let mut state = self.endpoint.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.peer
        };
        self.network.endpoints.remove(&self.endpoint.id);
        debug!(endpoint = self.endpoint.id, "loopback endpoint closed");

        if let Some(peer) = peer.and_then(|id| self.network.endpoint(id)) {
            let paired = peer.state.lock().peer == Some(self.endpoint.id);
            if paired {
                let _ = peer.events.send(TransportEvent::Closed).await;
            }
        }
        Ok(())
    }
}
