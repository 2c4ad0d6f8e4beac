use anyhow::{Context, Result};
use async_trait::async_trait;
use copresence_core::IceServerConfig;
use copresence_core::utils::default_ice_servers;
use serde::Deserialize;
use tracing::debug;

/// Source of STUN/TURN servers for new peer connections.
#[async_trait]
pub trait IceConfigProvider: Send + Sync + 'static {
    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>>;
}

/// A fixed server list.
#[derive(Debug, Clone)]
pub struct StaticIceConfig {
    servers: Vec<IceServerConfig>,
}

impl StaticIceConfig {
    pub fn new(servers: Vec<IceServerConfig>) -> Self {
        Self { servers }
    }
}

impl Default for StaticIceConfig {
    fn default() -> Self {
        Self::new(default_ice_servers())
    }
}

#[async_trait]
impl IceConfigProvider for StaticIceConfig {
    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>> {
        Ok(self.servers.clone())
    }
}

/// Fetches the server list from an HTTP endpoint on every call, so
/// short-lived TURN credentials stay fresh.
#[derive(Debug, Clone)]
pub struct HttpIceConfig {
    client: reqwest::Client,
    url: String,
}

impl HttpIceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl IceConfigProvider for HttpIceConfig {
    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>> {
        let servers = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?
            .error_for_status()?
            .json::<IceResponse>()
            .await
            .context("Malformed ICE configuration response")?
            .into_servers();
        debug!(url = %self.url, count = servers.len(), "fetched ICE servers");
        Ok(servers)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IceServerList {
    ice_servers: Vec<IceServerConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IceResponse {
    Wrapped { d: IceServerList },
    Bare(IceServerList),
}

impl IceResponse {
    fn into_servers(self) -> Vec<IceServerConfig> {
        match self {
            IceResponse::Wrapped { d } => d.ice_servers,
            IceResponse::Bare(list) => list.ice_servers,
        }
    }
}
