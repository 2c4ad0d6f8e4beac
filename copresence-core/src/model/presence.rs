use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A peer's entry in the presence directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub peer_id: PeerId,
    #[serde(default)]
    pub username: Option<String>,
    pub is_available: bool,
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

impl PresenceRecord {
    pub fn new(peer_id: PeerId, username: Option<String>) -> Self {
        Self {
            peer_id,
            username,
            is_available: true,
            room_id: None,
        }
    }

    /// Name to show for this peer; falls back to the id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.peer_id.to_string())
    }

    /// Applies a patch, returning whether anything changed.
    pub fn apply(&mut self, patch: &RecordPatch) -> bool {
        let before = self.clone();
        if let Some(username) = &patch.username {
            self.username = Some(username.clone());
        }
        if let Some(available) = patch.is_available {
            self.is_available = available;
        }
        if let Some(room_id) = &patch.room_id {
            self.room_id = room_id.clone();
        }
        before != *self
    }
}

/// Partial update of a [`PresenceRecord`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_null"
    )]
    pub room_id: Option<Option<RoomId>>,
}

// Keeps `"roomId": null` distinct from an absent field.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RecordPatch {
    pub fn username(name: impl Into<String>) -> Self {
        Self {
            username: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn availability(available: bool) -> Self {
        Self {
            is_available: Some(available),
            ..Default::default()
        }
    }

    pub fn room(room_id: Option<RoomId>) -> Self {
        Self {
            room_id: Some(room_id),
            ..Default::default()
        }
    }

    pub fn touches_room(&self) -> bool {
        self.room_id.is_some()
    }
}

/// Full snapshot of the presence directory, keyed by peer id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PresenceRecord>", into = "Vec<PresenceRecord>")]
pub struct Directory {
    peers: BTreeMap<PeerId, PresenceRecord>,
}

impl Directory {
    pub fn get(&self, peer_id: &PeerId) -> Option<&PresenceRecord> {
        self.peers.get(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.peers.values()
    }

    /// Peers other than `local` that can currently be called.
    pub fn available_peers<'a>(
        &'a self,
        local: &'a PeerId,
    ) -> impl Iterator<Item = &'a PresenceRecord> + 'a {
        self.peers
            .values()
            .filter(move |r| &r.peer_id != local && r.is_available)
    }

    pub fn in_room<'a>(&'a self, room_id: &'a RoomId) -> impl Iterator<Item = &'a PresenceRecord> + 'a {
        self.peers
            .values()
            .filter(move |r| r.room_id.as_ref() == Some(room_id))
    }
}

impl FromIterator<PresenceRecord> for Directory {
    fn from_iter<I: IntoIterator<Item = PresenceRecord>>(iter: I) -> Self {
        Self {
            peers: iter
                .into_iter()
                .map(|record| (record.peer_id.clone(), record))
                .collect(),
        }
    }
}

impl From<Vec<PresenceRecord>> for Directory {
    fn from(records: Vec<PresenceRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl From<Directory> for Vec<PresenceRecord> {
    fn from(directory: Directory) -> Self {
        directory.peers.into_values().collect()
    }
}

/// A single mutation of the directory, as observed by watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryChange {
    Inserted { record: PresenceRecord },
    Updated { before: PresenceRecord, after: PresenceRecord },
    Removed { record: PresenceRecord },
}

impl DirectoryChange {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            DirectoryChange::Inserted { record } | DirectoryChange::Removed { record } => {
                &record.peer_id
            }
            DirectoryChange::Updated { after, .. } => &after.peer_id,
        }
    }

    /// Room the peer stopped occupying with this change, if any.
    pub fn departed_room(&self) -> Option<&RoomId> {
        match self {
            DirectoryChange::Removed { record } => record.room_id.as_ref(),
            DirectoryChange::Updated { before, after } => match &before.room_id {
                Some(room) if after.room_id.as_ref() != Some(room) => Some(room),
                _ => None,
            },
            DirectoryChange::Inserted { .. } => None,
        }
    }
}

/// A roommate left the local peer's room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerLeave {
    pub peer_id: PeerId,
    pub room_id: RoomId,
}
