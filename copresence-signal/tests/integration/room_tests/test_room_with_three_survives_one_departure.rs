use copresence_signal::MemoryStore;

use crate::integration::{init_tracing, register_peers};

#[tokio::test]
async fn test_room_with_three_survives_one_departure() {
    init_tracing();

    let store = MemoryStore::new();
    let peers = register_peers(&store, &["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&peers[0], &peers[1], &peers[2]);

    let room = alice.create_room(bob.local_id()).await.unwrap();
    carol.join_room(&room).await.unwrap();
    assert_eq!(alice.get_peers_in_room(&room).await.unwrap().len(), 3);

    carol.leave_room().await.unwrap();
    assert_eq!(store.room_count(), 1);
    assert_eq!(alice.get_peers_in_room(&room).await.unwrap().len(), 2);
}
