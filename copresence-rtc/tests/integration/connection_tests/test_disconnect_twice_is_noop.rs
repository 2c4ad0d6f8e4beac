use copresence_rtc::{LoopbackNetwork, SessionEvent};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, next_event, spawn_peer, wait_close, wait_open, wait_pool};

#[tokio::test]
async fn test_disconnect_twice_is_noop() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut alice = spawn_peer(&store, &network, "alice").await;
    let mut bob = spawn_peer(&store, &network, "bob").await;

    alice.manager.connect(bob.id()).await.unwrap();
    wait_open(&mut bob.events, alice.id()).await.unwrap();

    alice.manager.disconnect(bob.id()).await.unwrap();
    alice.manager.disconnect(bob.id()).await.unwrap();

    wait_close(&mut alice.events, bob.id()).await.unwrap();
    wait_close(&mut bob.events, alice.id()).await.unwrap();

    let alice_pool = alice.manager.pool().await.unwrap();
    assert!(alice_pool.is_idle());
    let bob_pool = wait_pool(&bob.manager, CONNECT_TIMEOUT_MS, |p| p.established.is_empty())
        .await
        .unwrap();
    assert!(bob_pool.is_idle());

    // Only one Close per side.
    let extra = next_event(&mut alice.events, 200, |e| matches!(e, SessionEvent::Close { .. })).await;
    assert!(extra.is_err());
}
