//! # sentrydash-occupancy
//!
//! Occupancy reconciliation and relocation planning for SentryDash.
//!
//! ## Components
//!
//! - **Ledger** ([`ledger`]): pure `(room, event) -> next room` transitions for
//!   entry, exit and reservation events.
//! - **Planner** ([`planner`]): ranks alternate rooms by distance subject to an
//!   available-seat threshold.
//! - **Reservation** ([`reservation`]): checks a reserved room's occupants
//!   against the roster and proposes a fallback room.
//!
//! This crate owns no storage or network code. Callers read a room snapshot,
//! run it through the ledger and persist the result with a conditional write.

pub mod error;
pub mod filter;
pub mod ledger;
pub mod model;
pub mod planner;
pub mod reservation;

pub use error::{ErrorKind, OccupancyError};
pub use filter::RoomFilter;
pub use ledger::{apply, parse_room_id, Applied, EntryAction, EntryRequest, OccupancyEvent};
pub use model::{
    CountingMode, Location, Occupancy, OccupancyLevel, Profile, Reservation, Role, Room,
    RoomDocument, RoomType,
};
pub use planner::{assess_overflow, rank, suggest, Candidate, OverflowAssessment};
pub use reservation::{
    assess, LookupError, NonEnrolled, ReservationAssessment, ReservationRequest, RosterLookup,
};
