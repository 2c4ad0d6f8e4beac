use bytes::Bytes;
use copresence_core::PeerId;
use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::spawn_peer;

#[tokio::test]
async fn test_send_to_unconnected_peer_fails() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let alice = spawn_peer(&store, &network, "alice").await;
    let stranger = PeerId::new();

    let err = alice
        .manager
        .send(&stranger, Bytes::from_static(b"?"))
        .await
        .unwrap_err();
    assert_eq!(err, NegotiationError::PeerUnavailable(stranger));
}
