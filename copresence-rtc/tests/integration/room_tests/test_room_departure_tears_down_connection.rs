use copresence_core::PeerLeave;
use copresence_rtc::{LoopbackNetwork, SessionEvent};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, next_event, spawn_peer, wait_close};

#[tokio::test]
async fn test_room_departure_tears_down_connection() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut alice = spawn_peer(&store, &network, "alice").await;
    let mut bob = spawn_peer(&store, &network, "bob").await;

    let room = alice.signal.create_room(bob.id()).await.unwrap();
    alice.manager.connect(bob.id()).await.unwrap();

    let left = bob.signal.leave_room().await.unwrap();
    assert_eq!(left, room);

    let event = next_event(&mut alice.events, CONNECT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::PeerLeave(_))
    })
    .await
    .unwrap();
    match event {
        SessionEvent::PeerLeave(PeerLeave { peer_id, room_id }) => {
            assert_eq!(&peer_id, bob.id());
            assert_eq!(room_id, room);
        }
        other => panic!("Unexpected event {:?}", other),
    }

    wait_close(&mut alice.events, bob.id()).await.unwrap();
    wait_close(&mut bob.events, alice.id()).await.unwrap();
    assert!(alice.manager.pool().await.unwrap().established.is_empty());
    assert_eq!(store.room_count(), 0);
}
