//! Reservation assessment.
//!
//! Once a reservation has been stamped onto a room (via the ledger), the
//! current occupants are checked against the roster: anyone not enrolled in
//! the reserved course is reported. A fallback room is always proposed.
//!
//! Roster lookups are best-effort. A lookup that fails or finds nobody leaves
//! that occupant out of the report; enrollment status is never guessed.

use async_trait::async_trait;
use futures_util::future::join_all;
use sentrydash_id::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::OccupancyError;
use crate::ledger::{parse_room_id, required};
use crate::model::{Profile, Reservation, Room};
use crate::planner::{rank, Candidate};

/// Error type returned by roster lookups.
pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only access to roster profiles.
#[async_trait]
pub trait RosterLookup: Send + Sync {
    /// Resolve a profile by id. `Ok(None)` means the id is unknown.
    async fn lookup(&self, id: &UserId) -> Result<Option<Profile>, LookupError>;
}

/// Body of `POST /api/reserve`, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
}

impl ReservationRequest {
    /// Validate the request; every field is mandatory.
    pub fn parse(&self) -> Result<(RoomId, Reservation), OccupancyError> {
        let room_id = parse_room_id(self.room_id.as_deref())?;
        let course = required(self.course.as_deref(), "course")?;
        let section = required(self.section.as_deref(), "section")?;
        let teacher_id = required(self.teacher_id.as_deref(), "teacherId")?;
        let start_time = required(self.start_time.as_deref(), "startTime")?;

        let teacher_id = UserId::parse(teacher_id).map_err(|e| OccupancyError::InvalidField {
            field: "teacherId",
            message: e.to_string(),
        })?;

        Ok((
            room_id,
            Reservation {
                course: course.to_string(),
                section: section.to_string(),
                teacher_id,
                start_time: start_time.to_string(),
            },
        ))
    }
}

/// An occupant who is not enrolled in the reserved course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonEnrolled {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Combined result of a reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationAssessment {
    pub reservation: Reservation,
    pub non_enrolled: Vec<NonEnrolled>,
    pub suggestion: Option<Candidate>,
}

/// Assess a reservation that has already been stamped onto `room`.
///
/// `rooms` is the room set used to propose a fallback room; `room` itself is
/// excluded from the candidates.
pub async fn assess<L>(
    room: &Room,
    rooms: &[Room],
    reservation: &Reservation,
    roster: &L,
) -> ReservationAssessment
where
    L: RosterLookup + ?Sized,
{
    let non_enrolled = find_non_enrolled(room, &reservation.course, roster).await;
    let suggestion = rank(rooms, room, 0).into_iter().next();

    ReservationAssessment {
        reservation: reservation.clone(),
        non_enrolled,
        suggestion,
    }
}

/// Occupants of `room` whose roster entry lacks `course`, in occupant order.
pub async fn find_non_enrolled<L>(room: &Room, course: &str, roster: &L) -> Vec<NonEnrolled>
where
    L: RosterLookup + ?Sized,
{
    let occupants: Vec<&UserId> = room.occupancy().occupants().collect();
    let lookups = join_all(occupants.iter().map(|id| roster.lookup(id))).await;

    occupants
        .into_iter()
        .zip(lookups)
        .filter_map(|(id, result)| match result {
            Ok(Some(profile)) if profile.is_enrolled_in(course) => None,
            Ok(Some(profile)) => Some(NonEnrolled {
                id: profile.id,
                name: profile.name,
                email: profile.email,
            }),
            Ok(None) => {
                debug!(room_id = %room.id, occupant = %id, "Occupant not in roster; skipping");
                None
            }
            Err(e) => {
                warn!(room_id = %room.id, occupant = %id, error = %e, "Roster lookup failed; skipping occupant");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use crate::model::{Occupancy, Role, RoomType};

    struct FakeRoster {
        profiles: HashMap<String, Profile>,
        broken: BTreeSet<String>,
    }

    #[async_trait]
    impl RosterLookup for FakeRoster {
        async fn lookup(&self, id: &UserId) -> Result<Option<Profile>, LookupError> {
            if self.broken.contains(id.as_str()) {
                return Err("roster unavailable".into());
            }
            Ok(self.profiles.get(id.as_str()).cloned())
        }
    }

    fn student(id: &str, courses: &[&str]) -> Profile {
        Profile {
            id: UserId::parse(id).unwrap(),
            name: format!("Student {id}"),
            email: format!("{id}@example.edu"),
            role: Role::Student,
            courses_enrolled: courses.iter().map(|c| c.to_string()).collect(),
            courses_taught: BTreeSet::new(),
        }
    }

    fn roster(profiles: Vec<Profile>, broken: &[&str]) -> FakeRoster {
        FakeRoster {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.to_string(), p))
                .collect(),
            broken: broken.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn room_with(id: &str, occupants: &[&str], x: f64) -> Room {
        let set = occupants.iter().map(|o| UserId::parse(o).unwrap()).collect();
        Room::new(RoomId::parse(id).unwrap(), id, RoomType::Lab, 30)
            .unwrap()
            .with_occupancy(Occupancy::Roster(set))
            .with_location(x, 0.0)
    }

    fn reservation() -> Reservation {
        Reservation {
            course: "CS101".into(),
            section: "A".into(),
            teacher_id: UserId::parse("t1").unwrap(),
            start_time: "2024-05-01T09:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn flags_students_outside_the_course() {
        let room = room_with("L1", &["s1", "s2"], 0.0);
        let rooms = vec![room.clone(), room_with("L2", &[], 4.0)];
        let roster = roster(
            vec![student("s1", &["CS101"]), student("s2", &["MATH201"])],
            &[],
        );

        let out = assess(&room, &rooms, &reservation(), &roster).await;

        assert_eq!(out.non_enrolled.len(), 1);
        assert_eq!(out.non_enrolled[0].id.as_str(), "s2");
        assert_eq!(out.non_enrolled[0].email, "s2@example.edu");
        assert_eq!(out.suggestion.unwrap().room.id.as_str(), "L2");
        assert_eq!(out.reservation, reservation());
    }

    #[tokio::test]
    async fn failed_and_missing_lookups_are_skipped() {
        let room = room_with("L1", &["s1", "s2", "s3"], 0.0);
        let roster = roster(vec![student("s1", &["MATH201"])], &["s2"]);

        let out = find_non_enrolled(&room, "CS101", &roster).await;

        let ids: Vec<_> = out.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn suggestion_is_offered_without_non_enrolled_occupants() {
        let room = room_with("L1", &["s1"], 0.0);
        let rooms = vec![room.clone(), room_with("L2", &[], 9.0), room_with("L3", &[], 2.0)];
        let roster = roster(vec![student("s1", &["CS101"])], &[]);

        let out = assess(&room, &rooms, &reservation(), &roster).await;
        assert!(out.non_enrolled.is_empty());
        assert_eq!(out.suggestion.unwrap().room.id.as_str(), "L3");
    }

    #[test]
    fn request_requires_every_field() {
        let mut req = ReservationRequest {
            room_id: Some("L1".into()),
            course: Some("CS101".into()),
            section: Some("A".into()),
            teacher_id: Some("t1".into()),
            start_time: None,
        };
        assert_eq!(
            req.parse().unwrap_err(),
            OccupancyError::MissingField("startTime")
        );

        req.start_time = Some("2024-05-01T09:00:00Z".into());
        let (room_id, reservation) = req.parse().unwrap();
        assert_eq!(room_id.as_str(), "L1");
        assert_eq!(reservation.teacher_id.as_str(), "t1");
    }
}
