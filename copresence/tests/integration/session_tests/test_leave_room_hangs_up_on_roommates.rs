use copresence::rtc::{LoopbackNetwork, NegotiationError};
use copresence::signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{start_session, wait_close, wait_open};

#[tokio::test]
async fn test_leave_room_hangs_up_on_roommates() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = start_session(&store, &network, "alice").await;
    let bob = start_session(&store, &network, "bob").await;
    let mut bob_events = bob.subscribe();

    let room = alice.create_room(bob.local_id()).await.unwrap();
    alice.join_room_and_connect(&room).await.unwrap();
    wait_open(&mut bob_events, alice.local_id()).await.unwrap();

    let left = alice.leave_room().await.unwrap();
    assert_eq!(left, room);
    wait_close(&mut bob_events, alice.local_id()).await.unwrap();
    assert!(alice.manager().pool().await.unwrap().established.is_empty());

    let err = alice.leave_room().await.unwrap_err();
    assert_eq!(err, NegotiationError::NotInRoom);
}
