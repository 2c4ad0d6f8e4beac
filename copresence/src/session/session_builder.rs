use crate::session::Session;
use copresence_rtc::{
    ConnectionManager, HttpIceConfig, IceConfigProvider, MediaCache, MediaProvider,
    NegotiatorContext, Result, RtcTransportFactory, SessionConfig, SilentAudioSource,
    StaticIceConfig, TransportFactory,
};
use copresence_signal::{PresenceStore, SignalChannel};
use std::sync::Arc;
use tracing::info;

/// Collaborators of a [`Session`]. Anything left unset falls back to the
/// `webrtc` transport, a silent audio track, and the ICE servers named in
/// the config.
pub struct SessionBuilder {
    store: Arc<dyn PresenceStore>,
    username: Option<String>,
    config: SessionConfig,
    ice: Option<Arc<dyn IceConfigProvider>>,
    media: Option<Arc<dyn MediaProvider>>,
    transports: Option<Arc<dyn TransportFactory>>,
}

impl SessionBuilder {
    pub(crate) fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self {
            store,
            username: None,
            config: SessionConfig::default(),
            ice: None,
            media: None,
            transports: None,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ice_provider(mut self, ice: Arc<dyn IceConfigProvider>) -> Self {
        self.ice = Some(ice);
        self
    }

    pub fn media_provider(mut self, media: Arc<dyn MediaProvider>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(transports);
        self
    }

    /// Registers presence and starts the connection manager.
    pub async fn start(self) -> Result<Session> {
        let config = self.config;
        let ice = self.ice.unwrap_or_else(|| match &config.ice_config_url {
            Some(url) => Arc::new(HttpIceConfig::new(url.clone())),
            None => Arc::new(StaticIceConfig::new(config.ice_servers.clone())),
        });
        let media = Arc::new(MediaCache::new(
            self.media.unwrap_or_else(|| Arc::new(SilentAudioSource)),
        ));
        let transports = self
            .transports
            .unwrap_or_else(|| Arc::new(RtcTransportFactory));

        let signal = Arc::new(SignalChannel::register(self.store, self.username).await?);
        let ctx = Arc::new(NegotiatorContext::new(
            signal.clone(),
            ice,
            media.clone(),
            transports,
            config,
        ));
        let manager = ConnectionManager::start(ctx).await?;
        info!(peer = %signal.local_id(), "session started");

        Ok(Session::new(signal, manager, media))
    }
}
