use copresence_core::{RecordPatch, RoomId};
use copresence_signal::{PresenceStore, SignalError};

use crate::integration::init_tracing;
use crate::utils::{register_remote, start_relay};

#[tokio::test]
async fn test_room_changes_for_other_peers_are_refused() {
    init_tracing();

    let (url, service) = start_relay().await;
    let alice = register_remote(&url, "alice").await;
    let bob = register_remote(&url, "bob").await;
    let carol = register_remote(&url, "carol").await;
    let room = alice.create_room(bob.local_id()).await.unwrap();

    let err = carol.store().leave_room(bob.local_id()).await.unwrap_err();
    assert!(matches!(err, SignalError::Relay(_)));

    let err = carol
        .store()
        .join_room(bob.local_id(), &RoomId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::Relay(_)));

    // Membership only moves through join and leave, which collect rooms.
    let err = carol
        .store()
        .update(carol.local_id(), RecordPatch::room(Some(room.clone())))
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::Relay(_)));

    assert_eq!(bob.local_record().await.unwrap().room_id, Some(room));
    assert_eq!(carol.local_record().await.unwrap().room_id, None);
    assert_eq!(service.store().room_count(), 1);
}
