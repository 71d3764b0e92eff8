//! # sentrydash-id
//!
//! Identifier types for the SentryDash occupancy service.
//!
//! Two families of identifiers exist:
//!
//! - **Keys** (`RoomId`, `UserId`) are assigned outside the system: room
//!   codes like `A101` come from seed data, user ids from the roster. They are
//!   opaque, validated strings.
//! - **Generated IDs** (`RequestId`) are minted by the service and use a
//!   prefixed ULID format: `req_01HV4Z2WQXKJNM8GPQY6VBKC3D`.
//!
//! [`ResourceVersion`] is the per-document version stamp used for
//! compare-and-swap writes.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for the `define_id!` macro.
pub use ulid::Ulid;
