//! Occupancy service.
//!
//! Composes the occupancy core with the stores. Every mutation is a
//! read → [`apply`] → compare-and-swap cycle, retried with backoff when a
//! concurrent writer wins the race. Every store call runs under the
//! configured timeout.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sentrydash_id::{RoomId, UserId};
use sentrydash_occupancy::{
    apply, assess, assess_overflow, EntryRequest, LookupError, OccupancyError, OccupancyEvent,
    OccupancyLevel, OverflowAssessment, Profile, ReservationAssessment, ReservationRequest, Room,
    RoomFilter, RosterLookup,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::store::{rooms_of, RoomStore, RosterStore, StoreError, Versioned};

/// Live occupancy figures for one room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub id: RoomId,
    pub capacity: u32,
    pub current_count: u32,
    pub overflow: u32,
    pub available: u32,
    pub level: OccupancyLevel,
    pub percent: f64,
}

impl From<&Room> for RoomStatus {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            capacity: room.capacity(),
            current_count: room.current_count(),
            overflow: room.overflow(),
            available: room.available(),
            level: room.level(),
            percent: room.occupancy_percent(),
        }
    }
}

#[derive(Clone)]
pub struct OccupancyService {
    rooms: Arc<dyn RoomStore>,
    roster: Arc<dyn RosterStore>,
    config: ServiceConfig,
}

impl OccupancyService {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        roster: Arc<dyn RosterStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            rooms,
            roster,
            config,
        }
    }

    /// Run a store call under the store timeout.
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.config.store_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.config.store_timeout))?
    }

    /// Rooms matching `filter`, ordered by id.
    pub async fn list_rooms(
        &self,
        filter: &RoomFilter,
    ) -> Result<Vec<Versioned<Room>>, ServiceError> {
        let records = if filter.is_empty() {
            self.bounded(self.rooms.query_all()).await?
        } else {
            self.bounded(self.rooms.query(filter)).await?
        };
        Ok(records)
    }

    pub async fn get_room(&self, id: &RoomId) -> Result<Versioned<Room>, ServiceError> {
        self.bounded(self.rooms.get(id))
            .await?
            .ok_or_else(|| ServiceError::RoomNotFound(id.clone()))
    }

    pub async fn room_status(&self, id: &RoomId) -> Result<RoomStatus, ServiceError> {
        let record = self.get_room(id).await?;
        Ok(RoomStatus::from(&record.value))
    }

    /// Record an entry or exit.
    pub async fn record_entry(
        &self,
        request: &EntryRequest,
    ) -> Result<Versioned<Room>, ServiceError> {
        let (room_id, event) = request.parse()?;
        let record = self.apply_event(&room_id, &event).await?;

        if record.value.is_over_capacity() {
            warn!(
                room_id = %room_id,
                current_count = record.value.current_count(),
                capacity = record.value.capacity(),
                "Room capacity exceeded"
            );
        }
        Ok(record)
    }

    /// Overflow query for one room.
    pub async fn suggest(&self, room_id: &RoomId) -> Result<OverflowAssessment, ServiceError> {
        let rooms = rooms_of(self.bounded(self.rooms.query_all()).await?);
        match assess_overflow(&rooms, room_id) {
            Ok(assessment) => Ok(assessment),
            Err(OccupancyError::RoomNotFound(_)) => Err(ServiceError::RoomNotFound(room_id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Stamp a reservation onto a room, then report non-enrolled occupants
    /// and a fallback room.
    pub async fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> Result<ReservationAssessment, ServiceError> {
        let (room_id, reservation) = request.parse()?;
        let event = OccupancyEvent::Reserve(reservation.clone());
        let record = self.apply_event(&room_id, &event).await?;

        let rooms = rooms_of(self.bounded(self.rooms.query_all()).await?);
        let roster = BoundedRoster { service: self };
        let assessment = assess(&record.value, &rooms, &reservation, &roster).await;

        info!(
            room_id = %room_id,
            course = %reservation.course,
            non_enrolled = assessment.non_enrolled.len(),
            "Reservation recorded"
        );
        Ok(assessment)
    }

    /// Resolve a roster profile by email.
    pub async fn login(&self, email: Option<&str>) -> Result<Profile, ServiceError> {
        let email = match email.map(str::trim) {
            Some(e) if !e.is_empty() => e,
            _ => return Err(OccupancyError::MissingField("email").into()),
        };
        self.bounded(self.roster.find_by_email(email))
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(email.to_string()))
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.bounded(self.rooms.health_check()).await?;
        Ok(())
    }

    /// Apply `event` to the stored room with compare-and-swap.
    ///
    /// Each attempt re-reads the room, so a lost race or a timed-out read
    /// never writes state derived from a stale snapshot. Events that do not
    /// change the room are not written.
    pub async fn apply_event(
        &self,
        room_id: &RoomId,
        event: &OccupancyEvent,
    ) -> Result<Versioned<Room>, ServiceError> {
        let retry = self.config.retry;

        for attempt in 0..retry.max_attempts {
            let current = self
                .bounded(self.rooms.get(room_id))
                .await?
                .ok_or_else(|| ServiceError::RoomNotFound(room_id.clone()))?;
            let version = current.version;

            let applied = apply(current.value, event)?;
            if !applied.changed {
                debug!(room_id = %room_id, action = event.name(), "Event left room unchanged");
                return Ok(Versioned::new(applied.room, version));
            }

            match self
                .bounded(self.rooms.compare_and_swap(applied.room, version))
                .await
            {
                Ok(written) => {
                    info!(
                        room_id = %room_id,
                        action = event.name(),
                        attempt,
                        version = %written.version,
                        current_count = written.value.current_count(),
                        "Occupancy event applied"
                    );
                    return Ok(written);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    if attempt + 1 < retry.max_attempts {
                        let delay = retry.backoff.delay(attempt);
                        debug!(
                            room_id = %room_id,
                            action = event.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Version conflict; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(ServiceError::RoomNotFound(room_id.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            room_id = %room_id,
            action = event.name(),
            attempts = retry.max_attempts,
            "Giving up after repeated version conflicts"
        );
        Err(ServiceError::Conflict {
            room_id: room_id.clone(),
            attempts: retry.max_attempts,
        })
    }
}

/// Roster lookups under the service's store timeout.
struct BoundedRoster<'a> {
    service: &'a OccupancyService,
}

#[async_trait]
impl RosterLookup for BoundedRoster<'_> {
    async fn lookup(&self, id: &UserId) -> Result<Option<Profile>, LookupError> {
        let profile = self
            .service
            .bounded(self.service.roster.get(id))
            .await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{BackoffPolicy, RetryPolicy};
    use crate::store::{MemoryRoomStore, MemoryRosterStore};
    use sentrydash_id::ResourceVersion;
    use sentrydash_occupancy::{Occupancy, Role, RoomType};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn room(id: &str, capacity: u32, occupancy: Occupancy, x: f64) -> Room {
        Room::new(RoomId::parse(id).unwrap(), id, RoomType::Theory, capacity)
            .unwrap()
            .with_occupancy(occupancy)
            .with_location(x, 0.0)
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            store_timeout: Duration::from_secs(2),
            retry: RetryPolicy {
                max_attempts: 4,
                backoff: BackoffPolicy {
                    base: Duration::from_millis(1),
                    max: Duration::from_millis(5),
                    jitter: 0.0,
                },
            },
        }
    }

    fn service(rooms: Vec<Room>, profiles: Vec<Profile>) -> OccupancyService {
        OccupancyService::new(
            Arc::new(MemoryRoomStore::with_rooms(rooms)),
            Arc::new(MemoryRosterStore::with_profiles(profiles)),
            config(),
        )
    }

    fn entry(room_id: &str, action: &str, user_id: Option<&str>) -> EntryRequest {
        EntryRequest {
            room_id: Some(room_id.into()),
            action: Some(action.into()),
            user_id: user_id.map(Into::into),
        }
    }

    #[tokio::test]
    async fn entry_writes_through_cas() {
        let svc = service(vec![room("A101", 30, Occupancy::Raw(29), 0.0)], vec![]);

        let first = svc.record_entry(&entry("A101", "enter", None)).await.unwrap();
        assert_eq!(first.value.current_count(), 30);
        assert_eq!(first.version, ResourceVersion::new(2));

        let second = svc.record_entry(&entry("A101", "enter", None)).await.unwrap();
        assert_eq!(second.value.current_count(), 31);
        assert!(second.value.is_over_capacity());
    }

    #[tokio::test]
    async fn unchanged_event_skips_write() {
        let svc = service(vec![room("A101", 30, Occupancy::Unassigned, 0.0)], vec![]);
        let once = svc.record_entry(&entry("A101", "enter", Some("u1"))).await.unwrap();
        let twice = svc.record_entry(&entry("A101", "enter", Some("u1"))).await.unwrap();
        assert_eq!(once.version, twice.version);
        assert_eq!(twice.value.current_count(), 1);
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let svc = service(vec![], vec![]);
        let err = svc.record_entry(&entry("Z9", "enter", None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));

        let err = svc.suggest(&RoomId::parse("Z9").unwrap()).await.unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn suggest_reports_overflow_and_candidate() {
        let svc = service(
            vec![
                room("A101", 30, Occupancy::Raw(35), 0.0),
                room("B201", 30, Occupancy::Raw(27), 1.0),
                room("B202", 30, Occupancy::Raw(20), 5.0),
            ],
            vec![],
        );
        match svc.suggest(&RoomId::parse("A101").unwrap()).await.unwrap() {
            OverflowAssessment::Overflow {
                overflow,
                suggestion,
            } => {
                assert_eq!(overflow, 5);
                assert_eq!(suggestion.unwrap().room.id.as_str(), "B202");
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reserve_flags_non_enrolled_and_persists() {
        let occupants = BTreeSet::from([UserId::parse("s1").unwrap(), UserId::parse("s2").unwrap()]);
        let profile = |id: &str, course: &str| Profile {
            id: UserId::parse(id).unwrap(),
            name: id.to_uppercase(),
            email: format!("{id}@example.edu"),
            role: Role::Student,
            courses_enrolled: BTreeSet::from([course.to_string()]),
            courses_taught: BTreeSet::new(),
        };
        let svc = service(
            vec![
                room("L1", 30, Occupancy::Roster(occupants), 0.0),
                room("L2", 30, Occupancy::Unassigned, 3.0),
            ],
            vec![profile("s1", "CS101"), profile("s2", "MATH201")],
        );

        let request = ReservationRequest {
            room_id: Some("L1".into()),
            course: Some("CS101".into()),
            section: Some("A".into()),
            teacher_id: Some("t1".into()),
            start_time: Some("2024-05-01T09:00:00Z".into()),
        };
        let out = svc.reserve(&request).await.unwrap();
        assert_eq!(out.non_enrolled.len(), 1);
        assert_eq!(out.non_enrolled[0].id.as_str(), "s2");
        assert_eq!(out.suggestion.unwrap().room.id.as_str(), "L2");

        let stored = svc.get_room(&RoomId::parse("L1").unwrap()).await.unwrap();
        assert_eq!(
            stored.value.upcoming_reservation.unwrap().course,
            "CS101"
        );
    }

    #[tokio::test]
    async fn login_by_email() {
        let svc = service(
            vec![],
            vec![Profile {
                id: UserId::parse("t1").unwrap(),
                name: "Teacher".into(),
                email: "t1@example.edu".into(),
                role: Role::Teacher,
                courses_enrolled: BTreeSet::new(),
                courses_taught: BTreeSet::from(["CS101".to_string()]),
            }],
        );
        assert_eq!(svc.login(Some("T1@example.edu")).await.unwrap().role, Role::Teacher);
        assert!(matches!(
            svc.login(Some("x@example.edu")).await.unwrap_err(),
            ServiceError::UserNotFound(_)
        ));
        assert!(matches!(
            svc.login(None).await.unwrap_err(),
            ServiceError::Occupancy(OccupancyError::MissingField("email"))
        ));
    }

    #[tokio::test]
    async fn status_reports_level() {
        let svc = service(vec![room("A101", 10, Occupancy::Raw(9), 0.0)], vec![]);
        let status = svc.room_status(&RoomId::parse("A101").unwrap()).await.unwrap();
        assert_eq!(status.level, OccupancyLevel::Warning);
        assert_eq!(status.available, 1);
        assert_eq!(status.percent, 90.0);
    }
}
