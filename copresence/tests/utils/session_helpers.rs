use anyhow::{Result, bail};
use copresence::rtc::{LoopbackNetwork, MediaProvider, NoMedia, SessionEvent, StaticIceConfig};
use copresence::{PeerId, Session};
use copresence::signal::{MemoryStore, PresenceStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

pub const EVENT_TIMEOUT_MS: u64 = 3000;

pub async fn start_session_with(
    store: &MemoryStore,
    network: &LoopbackNetwork,
    name: &str,
    media: Arc<dyn MediaProvider>,
) -> Session {
    let shared: Arc<dyn PresenceStore> = Arc::new(store.clone());
    Session::builder(shared)
        .username(name)
        .ice_provider(Arc::new(StaticIceConfig::new(Vec::new())))
        .media_provider(media)
        .transport_factory(Arc::new(network.clone()))
        .start()
        .await
        .expect("Failed to start session")
}

pub async fn start_session(store: &MemoryStore, network: &LoopbackNetwork, name: &str) -> Session {
    start_session_with(store, network, name, Arc::new(NoMedia)).await
}

pub async fn next_event<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    predicate: F,
) -> Result<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return Ok(event),
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => bail!("Event channel closed"),
            Err(_) => bail!("Timeout after {}ms", EVENT_TIMEOUT_MS),
        }
    }
}

pub async fn wait_open(rx: &mut broadcast::Receiver<SessionEvent>, peer: &PeerId) -> Result<()> {
    next_event(rx, |e| matches!(e, SessionEvent::Open { peer_id } if peer_id == peer))
        .await
        .map(|_| ())
}

pub async fn wait_close(rx: &mut broadcast::Receiver<SessionEvent>, peer: &PeerId) -> Result<()> {
    next_event(rx, |e| matches!(e, SessionEvent::Close { peer_id } if peer_id == peer))
        .await
        .map(|_| ())
}

pub async fn eventually<F>(check: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    while !check() {
        if Instant::now() >= deadline {
            bail!("Condition not met after {}ms", EVENT_TIMEOUT_MS);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
