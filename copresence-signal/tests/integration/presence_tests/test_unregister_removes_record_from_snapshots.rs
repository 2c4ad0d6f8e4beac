use copresence_signal::MemoryStore;

use crate::integration::{init_tracing, register_peers};
use crate::utils::{NOTIFY_TIMEOUT_MS, recv_until, recv_within};

#[tokio::test]
async fn test_unregister_removes_record_from_snapshots() {
    init_tracing();

    let store = MemoryStore::new();
    let peers = register_peers(&store, &["alice", "bob"]).await;
    let alice = &peers[0];
    let bob_id = peers[1].local_id().clone();

    let mut presence = alice.watch_presence().await.unwrap();
    recv_within(&mut presence, NOTIFY_TIMEOUT_MS).await.unwrap();

    peers[1].unregister();

    let after = recv_until(&mut presence, NOTIFY_TIMEOUT_MS, |dir| !dir.contains(&bob_id))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(store.peer_count(), 1);
}
