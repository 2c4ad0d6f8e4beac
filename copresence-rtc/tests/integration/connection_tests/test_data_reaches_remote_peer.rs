use bytes::Bytes;
use copresence_rtc::{LoopbackNetwork, SessionEvent};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, next_event, spawn_peer, wait_open};

#[tokio::test]
async fn test_data_reaches_remote_peer() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;
    let mut bob = spawn_peer(&store, &network, "bob").await;

    alice.manager.connect(bob.id()).await.unwrap();
    wait_open(&mut bob.events, alice.id()).await.unwrap();

    alice
        .manager
        .send(bob.id(), Bytes::from_static(b"hello"))
        .await
        .unwrap();

    let event = next_event(&mut bob.events, CONNECT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::Data { .. })
    })
    .await
    .unwrap();
    match event {
        SessionEvent::Data { peer_id, data } => {
            assert_eq!(&peer_id, alice.id());
            assert_eq!(&data[..], b"hello");
        }
        other => panic!("Unexpected event {:?}", other),
    }

    let sent = alice
        .manager
        .broadcast(Bytes::from_static(b"all"))
        .await
        .unwrap();
    assert_eq!(sent, 1);
}
