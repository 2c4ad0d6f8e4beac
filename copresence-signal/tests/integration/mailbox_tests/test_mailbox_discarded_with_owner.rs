use copresence_core::SignalPayload;
use copresence_signal::{MemoryStore, SignalError};

use crate::integration::{init_tracing, register_peers};

#[tokio::test]
async fn test_mailbox_discarded_with_owner() {
    init_tracing();

    let store = MemoryStore::new();
    let mut peers = register_peers(&store, &["alice", "bob"]).await;
    let bob = peers.pop().unwrap();
    let bob_id = bob.local_id().clone();

    peers[0]
        .send(&bob_id, None, SignalPayload::Offer("v=0".into()))
        .await
        .unwrap();
    bob.unregister();

    assert_eq!(store.pending_messages(&bob_id), 0);
    assert_eq!(
        peers[0]
            .send(&bob_id, None, SignalPayload::Offer("v=0".into()))
            .await
            .unwrap_err(),
        SignalError::PeerUnavailable(bob_id)
    );
}
