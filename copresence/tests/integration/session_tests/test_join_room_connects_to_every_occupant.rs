use copresence::rtc::LoopbackNetwork;
use copresence::signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::start_session;

#[tokio::test]
async fn test_join_room_connects_to_every_occupant() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = start_session(&store, &network, "alice").await;
    let bob = start_session(&store, &network, "bob").await;
    let carol = start_session(&store, &network, "carol").await;

    let room = bob.create_room(carol.local_id()).await.unwrap();
    let results = alice.join_room_and_connect(&room).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    let pool = alice.manager().pool().await.unwrap();
    assert!(pool.is_established(bob.local_id()));
    assert!(pool.is_established(carol.local_id()));
}
