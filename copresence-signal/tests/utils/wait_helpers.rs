use anyhow::{Result, bail};
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single watcher notification (ms).
pub const NOTIFY_TIMEOUT_MS: u64 = 2000;

/// Receive the next item or fail after `timeout_ms`.
pub async fn recv_within<T>(rx: &mut mpsc::Receiver<T>, timeout_ms: u64) -> Result<T> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv()).await {
        Ok(Some(item)) => Ok(item),
        Ok(None) => bail!("Channel closed"),
        Err(_) => bail!("Timeout after {}ms", timeout_ms),
    }
}

/// Skip items until one matches `predicate`.
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

/// Assert nothing arrives for `quiet_ms`.
pub async fn assert_silent<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>, quiet_ms: u64) {
    if let Ok(Some(item)) = tokio::time::timeout(Duration::from_millis(quiet_ms), rx.recv()).await
    {
        panic!("Expected silence, received {:?}", item);
    }
}
