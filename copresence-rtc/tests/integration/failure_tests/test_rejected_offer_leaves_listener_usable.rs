use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, PeerSetup, spawn_peer, spawn_peer_with, wait_pool};

#[tokio::test]
async fn test_rejected_offer_leaves_listener_usable() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer_with(&store, "alice", PeerSetup::loopback(&network).timeout_ms(500)).await;
    let bob = spawn_peer(&store, &network, "bob").await;
    let carol = spawn_peer(&store, &network, "carol").await;

    network.reject_remote_descriptions(true);
    let err = alice.manager.connect(bob.id()).await.unwrap_err();
    assert!(matches!(err, NegotiationError::Timeout(_)));

    network.reject_remote_descriptions(false);
    wait_pool(&bob.manager, CONNECT_TIMEOUT_MS, |p| p.listening.bound_to.is_none())
        .await
        .unwrap();
    carol.manager.connect(bob.id()).await.unwrap();

    let pool = bob.manager.pool().await.unwrap();
    assert_eq!(pool.established, vec![carol.id().clone()]);
}
