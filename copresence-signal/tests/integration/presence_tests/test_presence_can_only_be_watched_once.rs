use copresence_signal::{MemoryStore, SignalError};

use crate::integration::{init_tracing, register_peers};

#[tokio::test]
async fn test_presence_can_only_be_watched_once() {
    init_tracing();

    let store = MemoryStore::new();
    let peers = register_peers(&store, &["alice"]).await;

    let _presence = peers[0].watch_presence().await.unwrap();
    let err = peers[0].watch_presence().await.unwrap_err();
    assert_eq!(err, SignalError::AlreadyWatched("presence"));
}
