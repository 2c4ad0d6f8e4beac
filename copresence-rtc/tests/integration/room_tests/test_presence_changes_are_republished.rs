use copresence_rtc::{LoopbackNetwork, SessionEvent};
use copresence_signal::MemoryStore;

use crate::integration::init_tracing;
use crate::utils::{CONNECT_TIMEOUT_MS, next_event, spawn_peer};

#[tokio::test]
async fn test_presence_changes_are_republished() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let mut alice = spawn_peer(&store, &network, "alice").await;
    let bob = spawn_peer(&store, &network, "bob").await;

    let event = next_event(&mut alice.events, CONNECT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::UsersChange(directory) if directory.contains(bob.id()))
    })
    .await
    .unwrap();
    assert_eq!(event.name(), "userschange");

    bob.signal.unregister();
    next_event(&mut alice.events, CONNECT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::UsersChange(directory) if !directory.contains(bob.id()))
    })
    .await
    .unwrap();
}
