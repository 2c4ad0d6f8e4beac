use bytes::Bytes;
use copresence::rtc::{LoopbackNetwork, SessionEvent};
use copresence::signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{next_event, start_session, wait_open};

#[tokio::test]
async fn test_create_room_then_connect() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = start_session(&store, &network, "alice").await;
    let bob = start_session(&store, &network, "bob").await;
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    let room = alice.create_room(bob.local_id()).await.unwrap();
    let results = alice.join_room_and_connect(&room).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(&results[0].0, bob.local_id());
    assert!(results[0].1.is_ok());
    wait_open(&mut alice_events, bob.local_id()).await.unwrap();
    wait_open(&mut bob_events, alice.local_id()).await.unwrap();

    alice
        .manager()
        .send(bob.local_id(), Bytes::from_static(b"hello"))
        .await
        .unwrap();
    let event = next_event(&mut bob_events, |e| matches!(e, SessionEvent::Data { .. }))
        .await
        .unwrap();
    match event {
        SessionEvent::Data { peer_id, data } => {
            assert_eq!(&peer_id, alice.local_id());
            assert_eq!(&data[..], b"hello");
        }
        other => panic!("Unexpected event {:?}", other),
    }

    let directory = bob.directory().await.unwrap();
    assert_eq!(directory.len(), 2);
}
