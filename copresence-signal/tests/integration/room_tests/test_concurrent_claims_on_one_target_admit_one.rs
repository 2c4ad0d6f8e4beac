use copresence_signal::MemoryStore;

use crate::integration::{init_tracing, register_peers};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_on_one_target_admit_one() {
    init_tracing();

    let store = MemoryStore::new();
    let peers = register_peers(&store, &["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&peers[0], &peers[1], &peers[2]);

    let (first, second) = tokio::join!(
        alice.create_room(carol.local_id()),
        bob.create_room(carol.local_id())
    );

    assert_eq!(
        first.is_ok() as u8 + second.is_ok() as u8,
        1,
        "exactly one claim should succeed: {:?} / {:?}",
        first,
        second
    );
    let winner_room = first.or(second).unwrap();
    assert_eq!(carol.local_record().await.unwrap().room_id, Some(winner_room));
    assert_eq!(store.room_count(), 1);
}
