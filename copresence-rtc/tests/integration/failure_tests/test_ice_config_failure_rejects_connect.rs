use std::sync::Arc;

use copresence_rtc::{LoopbackNetwork, NegotiationError};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{FailingIceConfig, PeerSetup, spawn_peer, spawn_peer_with};

#[tokio::test]
async fn test_ice_config_failure_rejects_connect() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut setup = PeerSetup::loopback(&network);
    setup.ice = Arc::new(FailingIceConfig);
    let alice = spawn_peer_with(&store, "alice", setup).await;
    let bob = spawn_peer(&store, &network, "bob").await;

    let err = alice.manager.connect(bob.id()).await.unwrap_err();
    assert!(matches!(err, NegotiationError::ConfigFetch(_)));
}
