use copresence_core::SignalPayload;

use crate::integration::init_tracing;
use crate::utils::{NOTIFY_TIMEOUT_MS, recv_until, register_remote, start_relay};

#[tokio::test]
async fn test_messages_sent_before_watching_are_replayed() {
    init_tracing();

    let (url, _service) = start_relay().await;
    let alice = register_remote(&url, "alice").await;
    let bob = register_remote(&url, "bob").await;

    for n in 0..3 {
        alice
            .send(bob.local_id(), None, SignalPayload::Answer(format!("v=0 {}", n)))
            .await
            .unwrap();
    }

    let mut inbound = bob.inbound().await.unwrap();
    for n in 0..3 {
        let envelope = recv_until(&mut inbound, NOTIFY_TIMEOUT_MS, |_| true)
            .await
            .unwrap();
        assert_eq!(envelope.payload, SignalPayload::Answer(format!("v=0 {}", n)));
    }
}
