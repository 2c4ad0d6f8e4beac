use copresence_rtc::LoopbackNetwork;
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, spawn_peer, wait_pool};

#[tokio::test]
async fn test_connect_all_reaches_every_room_member() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;
    let bob = spawn_peer(&store, &network, "bob").await;
    let carol = spawn_peer(&store, &network, "carol").await;

    let room = bob.signal.create_room(carol.id()).await.unwrap();
    alice.signal.join_room(&room).await.unwrap();

    let others: Vec<_> = alice
        .signal
        .get_peers_in_room(&room)
        .await
        .unwrap()
        .into_iter()
        .filter(|peer| peer != alice.id())
        .collect();
    assert_eq!(others.len(), 2);

    let results = alice.manager.connect_all(others).await;
    assert!(results.iter().all(|(_, result)| result.is_ok()));

    let mut expected = vec![bob.id().clone(), carol.id().clone()];
    expected.sort();
    let pool = alice.manager.pool().await.unwrap();
    assert_eq!(pool.established, expected);

    for peer in [&bob, &carol] {
        let pool = wait_pool(&peer.manager, CONNECT_TIMEOUT_MS, |p| p.is_established(alice.id()))
            .await
            .unwrap();
        assert_eq!(pool.established.len(), 1);
    }
}
