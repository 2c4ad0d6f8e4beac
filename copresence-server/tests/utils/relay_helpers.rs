use anyhow::{Result, bail};
use copresence_server::RelayService;
use copresence_signal::{MemoryStore, RelayStore, SignalChannel};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const NOTIFY_TIMEOUT_MS: u64 = 2000;

/// Serve a fresh relay on an ephemeral port and return its URL.
pub async fn start_relay() -> (String, RelayService) {
    let service = RelayService::new(MemoryStore::new());
    let router = service.router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("ws://{}/relay", addr), service)
}

/// Connect a new relay client and register it under `name`.
pub async fn register_remote(url: &str, name: &str) -> SignalChannel {
    let store = RelayStore::connect(url)
        .await
        .expect("Failed to connect to relay");
    SignalChannel::register(Arc::new(store), Some(name.to_string()))
        .await
        .expect("Failed to register over relay")
}

pub async fn recv_until<T, F>(rx: &mut mpsc::Receiver<T>, timeout_ms: u64, predicate: F) -> Result<T>
where
    F: Fn(&T) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(item)) if predicate(&item) => return Ok(item),
            Ok(Some(_)) => continue,
            Ok(None) => bail!("Channel closed"),
            Err(_) => bail!("Timeout after {}ms", timeout_ms),
        }
    }
}

/// Poll `check` until it holds.
pub async fn eventually<F>(timeout_ms: u64, check: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            bail!("Condition not met after {}ms", timeout_ms);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
