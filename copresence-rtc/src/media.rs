use crate::error::{NegotiationError, Result};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// The local capture shared by every connection of a session.
pub struct LocalStream {
    id: String,
    tracks: Vec<LocalTrack>,
    released: AtomicBool,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Capture device access.
#[async_trait]
pub trait MediaProvider: Send + Sync + 'static {
    async fn acquire(&self) -> AnyResult<LocalStream>;
}

/// One Opus track that never carries samples. Stands in for a microphone.
#[derive(Debug, Clone, Default)]
pub struct SilentAudioSource;

#[async_trait]
impl MediaProvider for SilentAudioSource {
    async fn acquire(&self) -> AnyResult<LocalStream> {
        let codec = RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
            rtcp_feedback: vec![],
        };
        let track: LocalTrack = Arc::new(TrackLocalStaticSample::new(
            codec,
            "audio".to_owned(),
            "copresence".to_owned(),
        ));
        Ok(LocalStream::new("copresence", vec![track]))
    }
}

/// Data-only sessions.
#[derive(Debug, Clone, Default)]
pub struct NoMedia;

#[async_trait]
impl MediaProvider for NoMedia {
    async fn acquire(&self) -> AnyResult<LocalStream> {
        Ok(LocalStream::new("empty", Vec::new()))
    }
}

/// Acquires the local stream once and hands the same stream to every
/// caller until [`MediaCache::release`].
pub struct MediaCache {
    provider: Arc<dyn MediaProvider>,
    slot: Mutex<CacheSlot>,
}

enum CacheSlot {
    Empty,
    Ready(Arc<LocalStream>),
    Released,
}

impl MediaCache {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self {
            provider,
            slot: Mutex::new(CacheSlot::Empty),
        }
    }

    /// A failed acquisition is not cached; the next call tries again.
    pub async fn acquire(&self) -> Result<Arc<LocalStream>> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            CacheSlot::Ready(stream) => return Ok(stream.clone()),
            CacheSlot::Released => {
                return Err(NegotiationError::MediaAccess(
                    "session media already released".to_owned(),
                ));
            }
            CacheSlot::Empty => {}
        }

        let stream = self
            .provider
            .acquire()
            .await
            .map_err(|e| NegotiationError::MediaAccess(e.to_string()))?;
        info!(stream = stream.id(), tracks = stream.tracks().len(), "local media acquired");

        let stream = Arc::new(stream);
        *slot = CacheSlot::Ready(stream.clone());
        Ok(stream)
    }

    pub async fn release(&self) {
        let mut slot = self.slot.lock().await;
        if let CacheSlot::Ready(stream) = std::mem::replace(&mut *slot, CacheSlot::Released) {
            stream.release();
            info!(stream = stream.id(), "local media released");
        }
    }

    pub async fn is_acquired(&self) -> bool {
        matches!(&*self.slot.lock().await, CacheSlot::Ready(_))
    }
}
