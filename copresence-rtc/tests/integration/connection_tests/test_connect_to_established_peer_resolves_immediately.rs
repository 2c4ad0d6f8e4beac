use copresence_rtc::LoopbackNetwork;
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::spawn_peer;

#[tokio::test]
async fn test_connect_to_established_peer_resolves_immediately() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;
    let bob = spawn_peer(&store, &network, "bob").await;

    alice.manager.connect(bob.id()).await.unwrap();
    alice.manager.connect(bob.id()).await.unwrap();

    let pool = alice.manager.pool().await.unwrap();
    assert_eq!(pool.established, vec![bob.id().clone()]);
    assert!(pool.outbound.is_empty());
}
