//! Service-level errors.

use sentrydash_id::RoomId;
use sentrydash_occupancy::{ErrorKind, OccupancyError};
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by [`crate::service::OccupancyService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Validation or invariant failure from the occupancy core.
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("no profile found for {0}")]
    UserNotFound(String),

    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("room {room_id} is being updated concurrently; gave up after {attempts} attempts")]
    Conflict { room_id: RoomId, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Occupancy(e) => e.kind(),
            ServiceError::RoomNotFound(_) | ServiceError::UserNotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict { .. } => ErrorKind::Conflict,
            ServiceError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            ServiceError::Store(StoreError::VersionConflict { .. }) => ErrorKind::Conflict,
            ServiceError::Store(_) => ErrorKind::Dependency,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Occupancy(e) => e.code(),
            ServiceError::RoomNotFound(_) => "room_not_found",
            ServiceError::UserNotFound(_) => "user_not_found",
            ServiceError::Conflict { .. } => "version_conflict",
            ServiceError::Store(e) => match e {
                StoreError::NotFound(_) => "room_not_found",
                StoreError::VersionConflict { .. } => "version_conflict",
                StoreError::Timeout(_) => "store_timeout",
                StoreError::Unavailable(_) => "store_unavailable",
                StoreError::Db(_) => "store_error",
                StoreError::InvalidDocument { .. } => "invalid_room_document",
            },
        }
    }

    /// True when repeating the request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Conflict { .. } => true,
            ServiceError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// True for store timeouts, which surface as gateway timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Timeout(_)))
    }
}
