//! Room and roster stores.
//!
//! Stores are the only place room documents are read or written. The
//! service layer talks to them through [`RoomStore`] and [`RosterStore`] so
//! the in-memory and Postgres backends are interchangeable.
//!
//! Room writes from the occupancy path always go through
//! [`RoomStore::compare_and_swap`]; [`RoomStore::upsert`] is reserved for
//! seeding.

pub mod memory;
pub mod postgres;
pub mod seed;

use std::time::Duration;

use async_trait::async_trait;
use sentrydash_id::{ResourceVersion, RoomId, UserId};
use sentrydash_occupancy::{Profile, Room, RoomFilter};
use thiserror::Error;

use crate::db::DbError;

pub use memory::{MemoryRoomStore, MemoryRosterStore};
pub use postgres::{PgRoomStore, PgRosterStore};

/// A stored value together with its version stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: ResourceVersion,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: ResourceVersion) -> Self {
        Self { value, version }
    }
}

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The stored version no longer matches the version that was read.
    #[error("room {id} changed since version {expected}")]
    VersionConflict {
        id: RoomId,
        expected: ResourceVersion,
    },

    /// The store did not answer in time. The operation may or may not have
    /// been applied.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Underlying database failure other than reachability.
    #[error(transparent)]
    Db(DbError),

    /// A stored document could not be decoded into a valid room or profile.
    #[error("stored document {id} is invalid: {message}")]
    InvalidDocument { id: String, message: String },
}

impl StoreError {
    /// Returns true if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::VersionConflict { .. }
            | StoreError::Timeout(_)
            | StoreError::Unavailable(_) => true,
            StoreError::NotFound(_) | StoreError::Db(_) | StoreError::InvalidDocument { .. } => {
                false
            }
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_connectivity() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Db(err)
        }
    }
}

/// Durable keyed storage of rooms.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Fetch one room. `Ok(None)` means the id is unknown; every other
    /// failure is an error.
    async fn get(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError>;

    /// Insert or replace a room unconditionally.
    async fn upsert(&self, room: Room) -> Result<Versioned<Room>, StoreError>;

    /// Replace a room only if its stored version equals `expected`.
    async fn compare_and_swap(
        &self,
        room: Room,
        expected: ResourceVersion,
    ) -> Result<Versioned<Room>, StoreError>;

    /// Every room, ordered by id.
    async fn query_all(&self) -> Result<Vec<Versioned<Room>>, StoreError>;

    /// Rooms matching `filter`, ordered by id.
    async fn query(&self, filter: &RoomFilter) -> Result<Vec<Versioned<Room>>, StoreError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Read access to roster profiles, plus upsert for seeding.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn get(&self, id: &UserId) -> Result<Option<Profile>, StoreError>;

    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError>;

    async fn upsert(&self, profile: Profile) -> Result<(), StoreError>;
}

/// Rooms of a versioned scan, without their versions.
pub fn rooms_of(records: Vec<Versioned<Room>>) -> Vec<Room> {
    records.into_iter().map(|r| r.value).collect()
}
