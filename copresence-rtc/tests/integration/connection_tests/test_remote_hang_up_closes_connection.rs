use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, spawn_peer, wait_close, wait_pool};

#[tokio::test]
async fn test_remote_hang_up_closes_connection() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut alice = spawn_peer(&store, &network, "alice").await;
    let bob = spawn_peer(&store, &network, "bob").await;

    alice.manager.connect(bob.id()).await.unwrap();
    wait_pool(&bob.manager, CONNECT_TIMEOUT_MS, |p| p.is_established(alice.id()))
        .await
        .unwrap();

    bob.manager.shutdown().await.unwrap();

    wait_close(&mut alice.events, bob.id()).await.unwrap();
    assert!(alice.manager.pool().await.unwrap().established.is_empty());
    assert!(matches!(
        bob.manager.pool().await,
        Err(NegotiationError::Closed)
    ));
}
