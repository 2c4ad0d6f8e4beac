use std::sync::Arc;

use copresence_core::SignalPayload;
use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, next_signal, register_bare, spawn_peer};

#[tokio::test]
async fn test_malformed_answer_rejects_attempt() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;
    let fake = Arc::new(register_bare(&store, "fake").await);
    let mut inbound = fake.inbound().await.unwrap();

    let responder = fake.clone();
    let caller = alice.id().clone();
    tokio::spawn(async move {
        let offer = next_signal(&mut inbound, CONNECT_TIMEOUT_MS, |e| {
            matches!(e.payload, SignalPayload::Offer(_))
        })
        .await
        .unwrap();
        responder
            .send(&caller, offer.attempt, SignalPayload::Answer("garbage".to_owned()))
            .await
            .unwrap();
    });

    let err = alice.manager.connect(fake.local_id()).await.unwrap_err();
    assert!(matches!(err, NegotiationError::DescriptionRejected(_)));

    // The failed attempt leaves the manager usable.
    let bob = spawn_peer(&store, &network, "bob").await;
    alice.manager.connect(bob.id()).await.unwrap();
}
