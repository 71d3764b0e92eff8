//! Error types for occupancy operations.

use thiserror::Error;

use crate::model::CountingMode;

/// Coarse error classification shared by every layer.
///
/// The API surface maps each kind to exactly one HTTP status and exposes
/// [`ErrorKind::as_str`] as the stable machine-checkable `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,

    /// Unknown room or user.
    NotFound,

    /// Concurrency-control retries exhausted.
    Conflict,

    /// Store unavailable, timed out, or returned unusable data.
    Dependency,
}

impl ErrorKind {
    /// Stable wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Dependency => "dependency_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the ledger, planner and reservation logic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OccupancyError {
    /// A required request field is absent or blank.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A request field is present but malformed.
    #[error("invalid field '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The entry action is neither `enter` nor `exit`.
    #[error("invalid action '{0}'; use 'enter' or 'exit'")]
    InvalidAction(String),

    /// The event's identifier presence disagrees with the room's counting mode.
    #[error("room {room_id} uses {mode} counting; {hint}")]
    CountingModeMismatch {
        room_id: String,
        mode: CountingMode,
        hint: &'static str,
    },

    /// The room id does not resolve.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// A stored room document violates the room invariants.
    #[error("invalid room document: {0}")]
    InvalidDocument(String),
}

impl OccupancyError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::InvalidAction(_)
            | Self::CountingModeMismatch { .. } => ErrorKind::Validation,
            Self::RoomNotFound(_) => ErrorKind::NotFound,
            Self::InvalidDocument(_) => ErrorKind::Dependency,
        }
    }

    /// Stable, fine-grained error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidAction(_) => "invalid_action",
            Self::CountingModeMismatch { .. } => "counting_mode_mismatch",
            Self::RoomNotFound(_) => "room_not_found",
            Self::InvalidDocument(_) => "invalid_room_document",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(
            OccupancyError::MissingField("roomId").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            OccupancyError::InvalidAction("jump".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            OccupancyError::RoomNotFound("A101".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            OccupancyError::InvalidDocument("capacity".into()).kind(),
            ErrorKind::Dependency
        );
    }

    #[test]
    fn messages_are_human_readable() {
        let err = OccupancyError::InvalidAction("jump".into());
        assert_eq!(err.to_string(), "invalid action 'jump'; use 'enter' or 'exit'");
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
    }
}
