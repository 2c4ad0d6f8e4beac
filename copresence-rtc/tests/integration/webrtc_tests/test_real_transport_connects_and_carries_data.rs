use std::time::Duration;

use bytes::Bytes;
use copresence_rtc::SessionEvent;
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::integration::webrtc_tests::host_only;
use crate::utils::{next_event, spawn_peer_with, wait_open};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_real_transport_connects_and_carries_data() {
    init_tracing();

    let store = MemoryStore::new();
    let alice = spawn_peer_with(&store, "alice", host_only()).await;
    let mut bob = spawn_peer_with(&store, "bob", host_only()).await;

    tokio::time::timeout(Duration::from_secs(20), alice.manager.connect(bob.id()))
        .await
        .expect("Connect timed out")
        .unwrap();
    wait_open(&mut bob.events, alice.id()).await.unwrap();

    // The data channel opens shortly after the connection; resend until it does.
    let mut delivered = false;
    for _ in 0..50 {
        alice
            .manager
            .send(bob.id(), Bytes::from_static(b"ping"))
            .await
            .unwrap();
        let data = next_event(&mut bob.events, 200, |e| {
            matches!(e, SessionEvent::Data { .. })
        })
        .await;
        if let Ok(SessionEvent::Data { data, .. }) = data {
            assert_eq!(&data[..], b"ping");
            delivered = true;
            break;
        }
    }
    assert!(delivered, "Data never arrived over the data channel");

    alice.manager.shutdown().await.unwrap();
    bob.manager.shutdown().await.unwrap();
}
