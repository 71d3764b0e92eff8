//! Room and roster data model.
//!
//! A [`Room`] is always deserialized through [`RoomDocument`], the on-the-wire
//! shape shared with stored documents and API responses. The conversion
//! enforces the room invariants:
//!
//! - `capacity > 0`
//! - `currentCount == |occupants|` whenever the room tracks named occupants
//! - a room never lists occupants while counting anonymously
//! - an upcoming reservation carries all four fields
//!
//! Attributes the model does not know about are carried through untouched so
//! read-modify-write cycles never drop data written by other tools.

use std::collections::BTreeSet;

use sentrydash_id::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OccupancyError;

// =============================================================================
// Room attributes
// =============================================================================

/// Kind of room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoomType {
    /// Lecture room.
    #[default]
    Theory,

    /// Laboratory.
    Lab,

    /// Any other label found in room documents.
    Other(String),
}

impl RoomType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Theory => "theory",
            Self::Lab => "lab",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RoomType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "theory" => Self::Theory,
            "lab" => Self::Lab,
            _ => Self::Other(s),
        }
    }
}

impl From<RoomType> for String {
    fn from(t: RoomType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planar room coordinates. A missing axis reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Location {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Location) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A scheduled reservation stamped onto a room.
///
/// All four fields are mandatory; a document with a partial reservation fails
/// to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub course: String,
    pub section: String,
    pub teacher_id: UserId,
    pub start_time: String,
}

// =============================================================================
// Occupancy
// =============================================================================

/// How a room counts its occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountingMode {
    /// Anonymous events adjust a raw counter.
    Raw,

    /// Identified events maintain a set of occupants.
    Roster,
}

impl std::fmt::Display for CountingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => f.write_str("anonymous"),
            Self::Roster => f.write_str("named-occupant"),
        }
    }
}

/// Occupancy state of a room, tagged by counting mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Occupancy {
    /// No event has chosen a mode yet and the room is empty.
    #[default]
    Unassigned,

    /// Anonymous head count.
    Raw(u32),

    /// Named occupants; the count is the set size.
    Roster(BTreeSet<UserId>),
}

impl Occupancy {
    /// Current head count.
    pub fn count(&self) -> u32 {
        match self {
            Self::Unassigned => 0,
            Self::Raw(n) => *n,
            Self::Roster(set) => u32::try_from(set.len()).unwrap_or(u32::MAX),
        }
    }

    /// The counting mode, once one has been chosen.
    pub fn mode(&self) -> Option<CountingMode> {
        match self {
            Self::Unassigned => None,
            Self::Raw(_) => Some(CountingMode::Raw),
            Self::Roster(_) => Some(CountingMode::Roster),
        }
    }

    /// Named occupants; empty unless the room is in roster mode.
    pub fn occupants(&self) -> impl Iterator<Item = &UserId> {
        match self {
            Self::Roster(set) => Some(set.iter()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }
}

/// Fill level bands used by dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyLevel {
    /// Below 80% of capacity.
    Normal,
    /// At least 80% but below capacity.
    Warning,
    /// At or above capacity.
    Full,
}

// =============================================================================
// Room
// =============================================================================

/// A physical room and its live occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RoomDocument", into = "RoomDocument")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub room_type: RoomType,
    capacity: u32,
    occupancy: Occupancy,
    pub location: Option<Location>,
    pub block: Option<String>,
    pub internet_available: bool,
    pub smart_board: bool,
    pub upcoming_reservation: Option<Reservation>,
    pub schedule: Vec<Value>,
    extra: Map<String, Value>,
}

impl Room {
    /// Create an empty room.
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        room_type: RoomType,
        capacity: u32,
    ) -> Result<Self, OccupancyError> {
        if capacity == 0 {
            return Err(OccupancyError::InvalidDocument(format!(
                "room {id} must have a capacity greater than zero"
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            room_type,
            capacity,
            occupancy: Occupancy::Unassigned,
            location: None,
            block: None,
            internet_available: false,
            smart_board: false,
            upcoming_reservation: None,
            schedule: Vec::new(),
            extra: Map::new(),
        })
    }

    #[must_use]
    pub fn with_location(mut self, x: f64, y: f64) -> Self {
        self.location = Some(Location::new(x, y));
        self
    }

    #[must_use]
    pub fn with_occupancy(mut self, occupancy: Occupancy) -> Self {
        self.occupancy = occupancy;
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub(crate) fn set_occupancy(&mut self, occupancy: Occupancy) {
        self.occupancy = occupancy;
    }

    pub fn current_count(&self) -> u32 {
        self.occupancy.count()
    }

    pub fn counting_mode(&self) -> Option<CountingMode> {
        self.occupancy.mode()
    }

    /// Location used for distance computations.
    pub fn position(&self) -> Location {
        self.location.unwrap_or(Location::ORIGIN)
    }

    /// Headcount that does not fit: `max(0, currentCount - capacity)`.
    pub fn overflow(&self) -> u32 {
        self.current_count().saturating_sub(self.capacity)
    }

    /// Free seats: `max(0, capacity - currentCount)`.
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.current_count())
    }

    pub fn is_over_capacity(&self) -> bool {
        self.current_count() > self.capacity
    }

    pub fn occupancy_percent(&self) -> f64 {
        f64::from(self.current_count()) * 100.0 / f64::from(self.capacity)
    }

    pub fn level(&self) -> OccupancyLevel {
        let percent = self.occupancy_percent();
        if percent >= 100.0 {
            OccupancyLevel::Full
        } else if percent >= 80.0 {
            OccupancyLevel::Warning
        } else {
            OccupancyLevel::Normal
        }
    }

    /// Attributes carried through without interpretation.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Wire representation of a [`Room`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDocument {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub room_type: RoomType,
    pub capacity: u32,
    #[serde(default)]
    pub current_count: u32,
    #[serde(default)]
    pub occupants: BTreeSet<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counting_mode: Option<CountingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default)]
    pub internet_available: bool,
    #[serde(default)]
    pub smart_board: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upcoming_reservation: Option<Reservation>,
    #[serde(default)]
    pub schedule: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<RoomDocument> for Room {
    type Error = OccupancyError;

    fn try_from(doc: RoomDocument) -> Result<Self, Self::Error> {
        if doc.capacity == 0 {
            return Err(OccupancyError::InvalidDocument(format!(
                "room {} must have a capacity greater than zero",
                doc.id
            )));
        }

        let occupancy = match doc.counting_mode {
            Some(CountingMode::Roster) => Occupancy::Roster(doc.occupants),
            Some(CountingMode::Raw) if !doc.occupants.is_empty() => {
                return Err(OccupancyError::InvalidDocument(format!(
                    "room {} counts anonymously but lists occupants",
                    doc.id
                )));
            }
            Some(CountingMode::Raw) => Occupancy::Raw(doc.current_count),
            None if !doc.occupants.is_empty() => Occupancy::Roster(doc.occupants),
            None if doc.current_count > 0 => Occupancy::Raw(doc.current_count),
            None => Occupancy::Unassigned,
        };

        Ok(Self {
            id: doc.id,
            name: doc.name,
            room_type: doc.room_type,
            capacity: doc.capacity,
            occupancy,
            location: doc.location,
            block: doc.block,
            internet_available: doc.internet_available,
            smart_board: doc.smart_board,
            upcoming_reservation: doc.upcoming_reservation,
            schedule: doc.schedule,
            extra: doc.extra,
        })
    }
}

impl From<Room> for RoomDocument {
    fn from(room: Room) -> Self {
        let current_count = room.current_count();
        let counting_mode = room.counting_mode();
        let occupants = match room.occupancy {
            Occupancy::Roster(set) => set,
            Occupancy::Unassigned | Occupancy::Raw(_) => BTreeSet::new(),
        };

        Self {
            id: room.id,
            name: room.name,
            room_type: room.room_type,
            capacity: room.capacity,
            current_count,
            occupants,
            counting_mode,
            location: room.location,
            block: room.block,
            internet_available: room.internet_available,
            smart_board: room.smart_board,
            upcoming_reservation: room.upcoming_reservation,
            schedule: room.schedule,
            extra: room.extra,
        }
    }
}

// =============================================================================
// Roster
// =============================================================================

/// Roster role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

/// A person known to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub courses_enrolled: BTreeSet<String>,
    #[serde(default)]
    pub courses_taught: BTreeSet<String>,
}

impl Profile {
    pub fn is_enrolled_in(&self, course: &str) -> bool {
        self.courses_enrolled.contains(course)
    }
}
