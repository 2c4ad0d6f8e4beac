mod test_messages_sent_before_watching_are_replayed;
mod test_room_changes_for_other_peers_are_refused;
