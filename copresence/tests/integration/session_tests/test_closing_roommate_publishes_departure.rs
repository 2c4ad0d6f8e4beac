use copresence::rtc::{LoopbackNetwork, SessionEvent};
use copresence::signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{next_event, start_session};

#[tokio::test]
async fn test_closing_roommate_publishes_departure() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = start_session(&store, &network, "alice").await;
    let bob = start_session(&store, &network, "bob").await;
    let mut alice_events = alice.subscribe();

    let room = alice.create_room(bob.local_id()).await.unwrap();
    alice.join_room_and_connect(&room).await.unwrap();

    bob.close().await;

    let event = next_event(&mut alice_events, |e| matches!(e, SessionEvent::PeerLeave(_)))
        .await
        .unwrap();
    match event {
        SessionEvent::PeerLeave(leave) => {
            assert_eq!(&leave.peer_id, bob.local_id());
            assert_eq!(leave.room_id, room);
        }
        other => panic!("Unexpected event {:?}", other),
    }
    assert!(alice.manager().pool().await.unwrap().established.is_empty());
}
