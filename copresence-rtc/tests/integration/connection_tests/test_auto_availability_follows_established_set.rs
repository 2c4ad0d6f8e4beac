use copresence_rtc::LoopbackNetwork;
use copresence_signal::MemoryStore;

use crate::integration::connection_tests::wait_for_availability;
use crate::integration::init_tracing;
use crate::utils::{spawn_peer, wait_open};

#[tokio::test]
async fn test_auto_availability_follows_established_set() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut alice = spawn_peer(&store, &network, "alice").await;
    let bob = spawn_peer(&store, &network, "bob").await;

    alice.manager.connect(bob.id()).await.unwrap();
    wait_open(&mut alice.events, bob.id()).await.unwrap();
    wait_for_availability(&alice, false).await;

    alice.manager.disconnect(bob.id()).await.unwrap();
    wait_for_availability(&alice, true).await;
}
