//! Relocation planner.
//!
//! Ranks alternate rooms for a source room by Euclidean distance, keeping only
//! rooms with at least the requested number of free seats. Ranking is a
//! stable sort, so rooms at equal distance keep their input order.

use sentrydash_id::RoomId;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::OccupancyError;
use crate::model::Room;

/// A room proposed as an alternative to the source room.
///
/// Serializes as the room document with `available` and `distance` set to
/// the computed values, replacing any stored attributes of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub room: Room,

    /// Free seats in the candidate room.
    pub available: u32,

    /// Distance from the source room.
    pub distance: f64,
}

impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = match serde_json::to_value(&self.room).map_err(S::Error::custom)? {
            Value::Object(doc) => doc,
            _ => return Err(S::Error::custom("room did not serialize to an object")),
        };
        doc.insert("available".to_string(), Value::from(self.available));
        doc.insert("distance".to_string(), Value::from(self.distance));
        doc.serialize(serializer)
    }
}

/// Outcome of an overflow query.
#[derive(Debug, Clone, PartialEq)]
pub enum OverflowAssessment {
    /// The source room is within capacity; the planner was not consulted.
    WithinCapacity(Room),

    /// The source room is over capacity.
    Overflow {
        overflow: u32,
        suggestion: Option<Candidate>,
    },
}

/// Rank every room except `source` that has at least `min_available` free
/// seats (and always at least one), nearest first.
pub fn rank(rooms: &[Room], source: &Room, min_available: u32) -> Vec<Candidate> {
    let threshold = min_available.max(1);
    let origin = source.position();

    let mut candidates: Vec<Candidate> = rooms
        .iter()
        .filter(|room| room.id != source.id)
        .filter(|room| room.available() >= threshold)
        .map(|room| Candidate {
            room: room.clone(),
            available: room.available(),
            distance: origin.distance_to(&room.position()),
        })
        .collect();

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates
}

/// Best relocation candidate for the room `source_id`.
///
/// Fails with `RoomNotFound` when `source_id` is not part of `rooms`.
pub fn suggest(
    rooms: &[Room],
    source_id: &RoomId,
    min_available: u32,
) -> Result<Option<Candidate>, OccupancyError> {
    let source = find(rooms, source_id)?;
    Ok(rank(rooms, source, min_available).into_iter().next())
}

/// Overflow query for `source_id`: the overflow headcount and, when there is
/// one, the nearest room able to absorb all of it.
pub fn assess_overflow(
    rooms: &[Room],
    source_id: &RoomId,
) -> Result<OverflowAssessment, OccupancyError> {
    let source = find(rooms, source_id)?;
    let overflow = source.overflow();
    if overflow == 0 {
        return Ok(OverflowAssessment::WithinCapacity(source.clone()));
    }

    let suggestion = rank(rooms, source, overflow).into_iter().next();
    Ok(OverflowAssessment::Overflow {
        overflow,
        suggestion,
    })
}

fn find<'a>(rooms: &'a [Room], id: &RoomId) -> Result<&'a Room, OccupancyError> {
    rooms
        .iter()
        .find(|room| &room.id == id)
        .ok_or_else(|| OccupancyError::RoomNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Occupancy, RoomType};
    use proptest::prelude::*;

    fn room(id: &str, capacity: u32, count: u32, x: f64, y: f64) -> Room {
        Room::new(RoomId::parse(id).unwrap(), id, RoomType::Theory, capacity)
            .unwrap()
            .with_occupancy(Occupancy::Raw(count))
            .with_location(x, y)
    }

    fn id(s: &str) -> RoomId {
        RoomId::parse(s).unwrap()
    }

    #[test]
    fn overflow_filter_uses_available_seats() {
        let rooms = vec![
            room("A101", 30, 35, 0.0, 0.0),
            room("B201", 40, 33, 10.0, 0.0),
            room("B202", 40, 36, 1.0, 0.0),
        ];

        match assess_overflow(&rooms, &id("A101")).unwrap() {
            OverflowAssessment::Overflow {
                overflow,
                suggestion,
            } => {
                assert_eq!(overflow, 5);
                let suggestion = suggestion.unwrap();
                assert_eq!(suggestion.room.id.as_str(), "B201");
                assert_eq!(suggestion.available, 7);
                assert_eq!(suggestion.distance, 10.0);
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn nearer_room_without_enough_seats_is_skipped() {
        let rooms = vec![
            room("A101", 30, 35, 0.0, 0.0),
            room("C301", 30, 27, 3.0, 4.0),
            room("C302", 30, 20, 30.0, 40.0),
        ];

        let best = suggest(&rooms, &id("A101"), 5).unwrap().unwrap();
        assert_eq!(best.room.id.as_str(), "C302");
        assert_eq!(best.available, 10);
        assert_eq!(best.distance, 50.0);
    }

    #[test]
    fn within_capacity_skips_planner() {
        let rooms = vec![room("A101", 30, 30, 0.0, 0.0), room("B201", 40, 0, 1.0, 1.0)];
        assert!(matches!(
            assess_overflow(&rooms, &id("A101")).unwrap(),
            OverflowAssessment::WithinCapacity(r) if r.id.as_str() == "A101"
        ));
    }

    #[test]
    fn stored_distance_is_replaced_by_computed_one() {
        let stored: Room = serde_json::from_value(serde_json::json!({
            "id": "B201", "capacity": 40, "currentCount": 0,
            "distance": 40, "available": 99, "location": {"x": 3, "y": 4}
        }))
        .unwrap();
        let rooms = vec![room("A101", 30, 35, 0.0, 0.0), stored];

        let best = suggest(&rooms, &id("A101"), 5).unwrap().unwrap();
        let text = serde_json::to_string(&best).unwrap();
        assert_eq!(text.matches("\"distance\"").count(), 1);
        assert_eq!(text.matches("\"available\"").count(), 1);

        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["distance"], 5.0);
        assert_eq!(json["available"], 40);
        assert_eq!(best.room.extra()["distance"], 40);
    }

    #[test]
    fn ties_keep_input_order() {
        let rooms = vec![
            room("A101", 30, 0, 0.0, 0.0),
            room("Z900", 30, 0, 5.0, 0.0),
            room("B100", 30, 0, 0.0, 5.0),
        ];
        let ranked = rank(&rooms, &rooms[0], 1);
        let ids: Vec<_> = ranked.iter().map(|c| c.room.id.as_str()).collect();
        assert_eq!(ids, vec!["Z900", "B100"]);
    }

    #[test]
    fn missing_location_is_origin() {
        let mut far = room("B201", 30, 0, 0.0, 0.0);
        far.location = None;
        let rooms = vec![room("A101", 30, 0, 6.0, 8.0), far];
        let best = suggest(&rooms, &id("A101"), 0).unwrap().unwrap();
        assert_eq!(best.distance, 10.0);
    }

    #[test]
    fn zero_threshold_still_requires_a_free_seat() {
        let rooms = vec![
            room("A101", 30, 10, 0.0, 0.0),
            room("B201", 30, 30, 1.0, 0.0),
            room("B202", 30, 29, 2.0, 0.0),
        ];
        let best = suggest(&rooms, &id("A101"), 0).unwrap().unwrap();
        assert_eq!(best.room.id.as_str(), "B202");
    }

    #[test]
    fn no_qualifying_room_yields_none() {
        let rooms = vec![room("A101", 30, 60, 0.0, 0.0), room("B201", 30, 28, 1.0, 0.0)];
        assert!(suggest(&rooms, &id("A101"), 30).unwrap().is_none());
    }

    #[test]
    fn unknown_source_is_not_found() {
        let rooms = vec![room("A101", 30, 0, 0.0, 0.0)];
        assert_eq!(
            suggest(&rooms, &id("Q999"), 1).unwrap_err(),
            OccupancyError::RoomNotFound("Q999".into())
        );
    }

    #[test]
    fn candidate_serializes_flat() {
        let rooms = vec![room("A101", 30, 35, 0.0, 0.0), room("B201", 40, 0, 3.0, 4.0)];
        let best = suggest(&rooms, &id("A101"), 5).unwrap().unwrap();
        let json = serde_json::to_value(&best).unwrap();
        assert_eq!(json["id"], "B201");
        assert_eq!(json["available"], 40);
        assert_eq!(json["distance"], 5.0);
        assert_eq!(json["capacity"], 40);
    }

    fn arb_rooms() -> impl Strategy<Value = Vec<(u32, u32, i16, i16)>> {
        proptest::collection::vec((1u32..60, 0u32..80, -50i16..50, -50i16..50), 1..24)
    }

    proptest! {
        #[test]
        fn ranking_is_sorted_and_deterministic(spec in arb_rooms(), min in 0u32..20) {
            let rooms: Vec<Room> = spec
                .iter()
                .enumerate()
                .map(|(i, (cap, count, x, y))| {
                    room(&format!("R{i}"), *cap, *count, f64::from(*x), f64::from(*y))
                })
                .collect();

            let ranked = rank(&rooms, &rooms[0], min);
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
            for c in &ranked {
                prop_assert!(c.available >= min.max(1));
                prop_assert!(c.room.id != rooms[0].id);
            }

            let first = suggest(&rooms, &rooms[0].id, min).unwrap();
            let second = suggest(&rooms, &rooms[0].id, min).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
