use copresence_core::{AttemptId, IceCandidate, SignalPayload};
use copresence_rtc::LoopbackNetwork;
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::integration::signaling_tests::send_offer;
use crate::utils::{CONNECT_TIMEOUT_MS, next_signal, register_bare, spawn_peer};

#[tokio::test]
async fn test_answer_echoes_attempt_on_candidates() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let bob = spawn_peer(&store, &network, "bob").await;
    let caller = register_bare(&store, "caller").await;
    let mut inbound = caller.inbound().await.unwrap();
    let attempt = AttemptId::new();

    send_offer(&caller, bob.id(), attempt, "v=0 loopback echo").await;

    let candidate = next_signal(&mut inbound, CONNECT_TIMEOUT_MS, |e| {
        matches!(e.payload, SignalPayload::IceCandidate(_))
    })
    .await
    .unwrap();
    assert_eq!(candidate.attempt, Some(attempt));
}
