//! In-memory store backend.
//!
//! Used for local development, tests and seeded demo deployments. Versions
//! are tracked per room exactly as the Postgres backend tracks them, so the
//! compare-and-swap path behaves the same.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sentrydash_id::{ResourceVersion, RoomId, UserId};
use sentrydash_occupancy::{Profile, Room, RoomFilter};
use tokio::sync::RwLock;

use super::{RoomStore, RosterStore, StoreError, Versioned};

/// Rooms held in a sorted map.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<BTreeMap<RoomId, Versioned<Room>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store preloaded with `rooms`, each at the first version.
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|room| (room.id.clone(), Versioned::new(room, ResourceVersion::FIRST)))
            .collect();
        Self {
            rooms: RwLock::new(rooms),
        }
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn get(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError> {
        Ok(self.rooms.read().await.get(id).cloned())
    }

    async fn upsert(&self, room: Room) -> Result<Versioned<Room>, StoreError> {
        let mut rooms = self.rooms.write().await;
        let version = rooms
            .get(&room.id)
            .map(|existing| existing.version.next())
            .unwrap_or(ResourceVersion::FIRST);
        let record = Versioned::new(room, version);
        rooms.insert(record.value.id.clone(), record.clone());
        Ok(record)
    }

    async fn compare_and_swap(
        &self,
        room: Room,
        expected: ResourceVersion,
    ) -> Result<Versioned<Room>, StoreError> {
        let mut rooms = self.rooms.write().await;
        let Some(current) = rooms.get_mut(&room.id) else {
            return Err(StoreError::NotFound(room.id));
        };
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                id: room.id,
                expected,
            });
        }
        *current = Versioned::new(room, expected.next());
        Ok(current.clone())
    }

    async fn query_all(&self) -> Result<Vec<Versioned<Room>>, StoreError> {
        Ok(self.rooms.read().await.values().cloned().collect())
    }

    async fn query(&self, filter: &RoomFilter) -> Result<Vec<Versioned<Room>>, StoreError> {
        Ok(self
            .rooms
            .read()
            .await
            .values()
            .filter(|record| filter.matches(&record.value))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Roster profiles keyed by id.
#[derive(Default)]
pub struct MemoryRosterStore {
    profiles: RwLock<BTreeMap<UserId, Profile>>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let profiles = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            profiles: RwLock::new(profiles),
        }
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn get(&self, id: &UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let email = email.trim();
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn upsert(&self, profile: Profile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentrydash_occupancy::{Occupancy, Role, RoomType};

    fn room(id: &str, count: u32) -> Room {
        Room::new(RoomId::parse(id).unwrap(), id, RoomType::Theory, 30)
            .unwrap()
            .with_occupancy(Occupancy::Raw(count))
    }

    #[tokio::test]
    async fn cas_bumps_version_and_rejects_stale_writes() {
        let store = MemoryRoomStore::with_rooms([room("A101", 1)]);
        let id = RoomId::parse("A101").unwrap();

        let read = store.get(&id).await.unwrap().unwrap();
        assert_eq!(read.version, ResourceVersion::FIRST);

        let written = store
            .compare_and_swap(room("A101", 2), read.version)
            .await
            .unwrap();
        assert_eq!(written.version, ResourceVersion::new(2));

        let err = store
            .compare_and_swap(room("A101", 3), read.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let current = store.get(&id).await.unwrap().unwrap();
        assert_eq!(current.value.current_count(), 2);
    }

    #[tokio::test]
    async fn cas_on_missing_room_is_not_found() {
        let store = MemoryRoomStore::new();
        let err = store
            .compare_and_swap(room("Z9", 0), ResourceVersion::FIRST)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn scans_are_sorted_by_id() {
        let store = MemoryRoomStore::with_rooms([room("C3", 0), room("A1", 0), room("B2", 0)]);
        let ids: Vec<_> = store
            .query_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.value.id.to_string())
            .collect();
        assert_eq!(ids, vec!["A1", "B2", "C3"]);

        let filtered = store
            .query(&RoomFilter {
                search: Some("b".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn roster_email_lookup_ignores_case() {
        let store = MemoryRosterStore::new();
        store
            .upsert(Profile {
                id: UserId::parse("t1").unwrap(),
                name: "Teacher".into(),
                email: "Teach@Example.edu".into(),
                role: Role::Teacher,
                courses_enrolled: Default::default(),
                courses_taught: Default::default(),
            })
            .await
            .unwrap();

        let found = store.find_by_email(" teach@example.EDU ").await.unwrap();
        assert_eq!(found.unwrap().id.as_str(), "t1");
        assert!(store.find_by_email("nobody@example.edu").await.unwrap().is_none());
    }
}
