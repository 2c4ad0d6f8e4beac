use copresence_core::{AttemptId, SignalPayload};
use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::integration::signaling_tests::send_offer;
use crate::utils::{CONNECT_TIMEOUT_MS, next_signal, register_bare, spawn_peer};

#[tokio::test]
async fn test_busy_listener_rejects_third_caller() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let bob = spawn_peer(&store, &network, "bob").await;
    let carol = spawn_peer(&store, &network, "carol").await;
    let caller = register_bare(&store, "caller").await;
    let mut inbound = caller.inbound().await.unwrap();

    // Offer without candidates: bob answers but never attaches.
    send_offer(&caller, bob.id(), AttemptId::new(), "v=0 loopback busy").await;
    next_signal(&mut inbound, CONNECT_TIMEOUT_MS, |e| {
        matches!(e.payload, SignalPayload::Answer(_))
    })
    .await
    .unwrap();

    let err = carol.manager.connect(bob.id()).await.unwrap_err();
    assert_eq!(err, NegotiationError::PeerUnavailable(bob.id().clone()));

    let pool = bob.manager.pool().await.unwrap();
    assert_eq!(pool.listening.bound_to.as_ref(), Some(caller.local_id()));
    assert!(pool.established.is_empty());
}
