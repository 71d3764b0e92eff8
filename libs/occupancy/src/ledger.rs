//! Occupancy ledger.
//!
//! [`apply`] is a pure transition `(room, event) -> (next room, changed)`. It
//! performs no I/O; callers persist the returned room through a
//! compare-and-swap write and re-run the transition on a fresh snapshot if the
//! write loses a race.
//!
//! # Invariants
//!
//! - In roster mode `currentCount == |occupants|` after every transition.
//! - The head count never drops below zero.
//! - Once a room has a counting mode, events of the other mode are rejected.
//! - Entering twice with the same occupant id is a no-op, as is exiting with an
//!   id that is not present.

use std::collections::BTreeSet;

use sentrydash_id::{RoomId, UserId};
use serde::Deserialize;

use crate::error::OccupancyError;
use crate::model::{CountingMode, Occupancy, Reservation, Room};

/// Entry/exit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Enter,
    Exit,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
        }
    }
}

impl std::str::FromStr for EntryAction {
    type Err = OccupancyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enter" => Ok(Self::Enter),
            "exit" => Ok(Self::Exit),
            other => Err(OccupancyError::InvalidAction(other.to_string())),
        }
    }
}

/// An event the ledger can apply to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancyEvent {
    Enter { occupant: Option<UserId> },
    Exit { occupant: Option<UserId> },
    Reserve(Reservation),
}

impl OccupancyEvent {
    pub fn entry(action: EntryAction, occupant: Option<UserId>) -> Self {
        match action {
            EntryAction::Enter => Self::Enter { occupant },
            EntryAction::Exit => Self::Exit { occupant },
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enter { .. } => "enter",
            Self::Exit { .. } => "exit",
            Self::Reserve(_) => "reserve",
        }
    }
}

/// Body of `POST /api/entry`, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl EntryRequest {
    /// Validate the request into a room id and an event.
    ///
    /// A blank `userId` is treated as absent, i.e. an anonymous event.
    pub fn parse(&self) -> Result<(RoomId, OccupancyEvent), OccupancyError> {
        let room_id = parse_room_id(self.room_id.as_deref())?;
        let action: EntryAction = required(self.action.as_deref(), "action")?.parse()?;

        let occupant = match self.user_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => Some(UserId::parse(id).map_err(|e| OccupancyError::InvalidField {
                field: "userId",
                message: e.to_string(),
            })?),
        };

        Ok((room_id, OccupancyEvent::entry(action, occupant)))
    }
}

/// Validate a mandatory `roomId` request field.
pub fn parse_room_id(value: Option<&str>) -> Result<RoomId, OccupancyError> {
    let raw = required(value, "roomId")?;
    RoomId::parse(raw).map_err(|e| OccupancyError::InvalidField {
        field: "roomId",
        message: e.to_string(),
    })
}

/// Returns the trimmed value, or `MissingField` when absent or blank.
pub(crate) fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, OccupancyError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(OccupancyError::MissingField(field)),
    }
}

/// Result of applying an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The next room state.
    pub room: Room,

    /// Whether the event changed the room. Unchanged rooms need not be written.
    pub changed: bool,
}

impl Applied {
    fn changed(room: Room) -> Self {
        Self {
            room,
            changed: true,
        }
    }

    fn unchanged(room: Room) -> Self {
        Self {
            room,
            changed: false,
        }
    }
}

/// Apply an event to a room snapshot.
pub fn apply(mut room: Room, event: &OccupancyEvent) -> Result<Applied, OccupancyError> {
    match event {
        OccupancyEvent::Reserve(reservation) => {
            if room.upcoming_reservation.as_ref() == Some(reservation) {
                return Ok(Applied::unchanged(room));
            }
            room.upcoming_reservation = Some(reservation.clone());
            Ok(Applied::changed(room))
        }
        OccupancyEvent::Enter { occupant } => {
            let next = match (room.occupancy(), occupant) {
                (Occupancy::Unassigned, None) => Occupancy::Raw(1),
                (Occupancy::Raw(n), None) => Occupancy::Raw(n.saturating_add(1)),
                (Occupancy::Unassigned, Some(id)) => Occupancy::Roster(BTreeSet::from([id.clone()])),
                (Occupancy::Roster(set), Some(id)) => {
                    if set.contains(id) {
                        return Ok(Applied::unchanged(room));
                    }
                    let mut set = set.clone();
                    set.insert(id.clone());
                    Occupancy::Roster(set)
                }
                (Occupancy::Roster(_), None) => return Err(mismatch(&room, CountingMode::Roster)),
                (Occupancy::Raw(_), Some(_)) => return Err(mismatch(&room, CountingMode::Raw)),
            };
            room.set_occupancy(next);
            Ok(Applied::changed(room))
        }
        OccupancyEvent::Exit { occupant } => {
            let next = match (room.occupancy(), occupant) {
                (Occupancy::Unassigned, _) | (Occupancy::Raw(0), None) => {
                    return Ok(Applied::unchanged(room));
                }
                (Occupancy::Raw(n), None) => Occupancy::Raw(n - 1),
                (Occupancy::Roster(set), Some(id)) => {
                    if !set.contains(id) {
                        return Ok(Applied::unchanged(room));
                    }
                    let mut set = set.clone();
                    set.remove(id);
                    Occupancy::Roster(set)
                }
                (Occupancy::Roster(_), None) => return Err(mismatch(&room, CountingMode::Roster)),
                (Occupancy::Raw(_), Some(_)) => return Err(mismatch(&room, CountingMode::Raw)),
            };
            room.set_occupancy(next);
            Ok(Applied::changed(room))
        }
    }
}

fn mismatch(room: &Room, mode: CountingMode) -> OccupancyError {
    let hint = match mode {
        CountingMode::Raw => "occupant identifiers are not accepted",
        CountingMode::Roster => "an occupant identifier is required",
    };
    OccupancyError::CountingModeMismatch {
        room_id: room.id.to_string(),
        mode,
        hint,
    }
}
