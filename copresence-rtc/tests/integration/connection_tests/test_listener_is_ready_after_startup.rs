use copresence_rtc::{LoopbackNetwork, NegotiationState};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, spawn_peer, wait_pool};

#[tokio::test]
async fn test_listener_is_ready_after_startup() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;

    let pool = wait_pool(&alice.manager, CONNECT_TIMEOUT_MS, |p| {
        p.listening.state == NegotiationState::Ready
    })
    .await
    .unwrap();
    assert!(pool.is_idle());
    assert_eq!(network.open_endpoints(), 1);
}
