//! Postgres store backend.
//!
//! Rooms and profiles are stored as JSONB documents next to a few indexed
//! columns. Each room row carries a `version` column that every write bumps;
//! compare-and-swap is a single conditional `UPDATE`.

use std::sync::Arc;

use async_trait::async_trait;
use sentrydash_id::{ResourceVersion, RoomId, UserId};
use sentrydash_occupancy::{Profile, Room, RoomFilter};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::{debug, warn};

use super::{RoomStore, RosterStore, StoreError, Versioned};
use crate::db::{DbError, LazyDatabase};

/// Raw `rooms` row.
#[derive(Debug)]
struct RoomRow {
    id: String,
    doc: serde_json::Value,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RoomRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            doc: row.try_get("doc")?,
            version: row.try_get("version")?,
        })
    }
}

impl RoomRow {
    fn decode(self) -> Result<Versioned<Room>, StoreError> {
        let room: Room =
            serde_json::from_value(self.doc).map_err(|e| StoreError::InvalidDocument {
                id: self.id.clone(),
                message: e.to_string(),
            })?;
        if room.id.as_str() != self.id {
            return Err(StoreError::InvalidDocument {
                message: format!("document id {} does not match row key", room.id),
                id: self.id,
            });
        }
        Ok(Versioned::new(room, ResourceVersion::new(self.version)))
    }
}

/// Decode a scan, skipping rows whose documents no longer parse so one bad
/// document cannot hide every other room.
fn decode_scan(rows: Vec<RoomRow>) -> Vec<Versioned<Room>> {
    rows.into_iter()
        .filter_map(|row| match row.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable room document");
                None
            }
        })
        .collect()
}

fn encode(room: &Room) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(room).map_err(|e| StoreError::Db(DbError::Serialization(e)))
}

fn query_error(e: sqlx::Error) -> StoreError {
    DbError::Query(e).into()
}

/// Escape `%`, `_` and `\` for use inside a `LIKE` pattern.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Room store over the shared lazily-connected database.
#[derive(Clone)]
pub struct PgRoomStore {
    db: Arc<LazyDatabase>,
}

impl PgRoomStore {
    pub fn new(db: Arc<LazyDatabase>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> Result<&sqlx::PgPool, StoreError> {
        Ok(self.db.pool().await?)
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn get(&self, id: &RoomId) -> Result<Option<Versioned<Room>>, StoreError> {
        let row: Option<RoomRow> =
            sqlx::query_as("SELECT id, doc, version FROM rooms WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(self.pool().await?)
                .await
                .map_err(query_error)?;

        row.map(RoomRow::decode).transpose()
    }

    async fn upsert(&self, room: Room) -> Result<Versioned<Room>, StoreError> {
        let doc = encode(&room)?;
        let version: i64 = sqlx::query(
            r#"
            INSERT INTO rooms (id, doc, version, updated_at)
            VALUES ($1, $2, 1, now())
            ON CONFLICT (id) DO UPDATE
                SET doc = EXCLUDED.doc,
                    version = rooms.version + 1,
                    updated_at = now()
            RETURNING version
            "#,
        )
        .bind(room.id.as_str())
        .bind(&doc)
        .fetch_one(self.pool().await?)
        .await
        .map_err(query_error)?
        .try_get("version")
        .map_err(query_error)?;

        Ok(Versioned::new(room, ResourceVersion::new(version)))
    }

    async fn compare_and_swap(
        &self,
        room: Room,
        expected: ResourceVersion,
    ) -> Result<Versioned<Room>, StoreError> {
        let doc = encode(&room)?;
        let pool = self.pool().await?;

        let result = sqlx::query(
            r#"
            UPDATE rooms
            SET doc = $2, version = version + 1, updated_at = now()
            WHERE id = $1 AND version = $3
            "#,
        )
        .bind(room.id.as_str())
        .bind(&doc)
        .bind(expected.value())
        .execute(pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 1 {
            return Ok(Versioned::new(room, expected.next()));
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM rooms WHERE id = $1")
            .bind(room.id.as_str())
            .fetch_optional(pool)
            .await
            .map_err(query_error)?;

        match exists {
            None => Err(StoreError::NotFound(room.id)),
            Some(actual) => {
                debug!(room_id = %room.id, expected = %expected, actual, "Conditional write lost");
                Err(StoreError::VersionConflict {
                    id: room.id,
                    expected,
                })
            }
        }
    }

    async fn query_all(&self) -> Result<Vec<Versioned<Room>>, StoreError> {
        let rows: Vec<RoomRow> = sqlx::query_as("SELECT id, doc, version FROM rooms ORDER BY id")
            .fetch_all(self.pool().await?)
            .await
            .map_err(query_error)?;

        Ok(decode_scan(rows))
    }

    async fn query(&self, filter: &RoomFilter) -> Result<Vec<Versioned<Room>>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, doc, version FROM rooms WHERE TRUE");

        if let Some(room_type) = &filter.room_type {
            qb.push(" AND doc->>'type' = ").push_bind(room_type.as_str().to_string());
        }
        if let Some(needle) = filter.needle() {
            let pattern = like_pattern(&needle);
            qb.push(" AND (lower(doc->>'name') LIKE ")
                .push_bind(pattern.clone())
                .push(" OR lower(id) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = filter.min_capacity {
            qb.push(" AND (doc->>'capacity')::bigint >= ")
                .push_bind(i64::from(min));
        }
        if let Some(want) = filter.internet {
            qb.push(" AND COALESCE((doc->>'internetAvailable')::boolean, false) = ")
                .push_bind(want);
        }
        if let Some(want) = filter.smart_board {
            qb.push(" AND COALESCE((doc->>'smartBoard')::boolean, false) = ")
                .push_bind(want);
        }
        qb.push(" ORDER BY id");

        let rows: Vec<RoomRow> = qb
            .build_query_as()
            .fetch_all(self.pool().await?)
            .await
            .map_err(query_error)?;

        // Free seats depend on the derived count, so the full predicate is
        // re-checked on the decoded rooms.
        let mut records = decode_scan(rows);
        records.retain(|record| filter.matches(&record.value));
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.health_check().await?;
        Ok(())
    }
}

/// Roster store over the shared lazily-connected database.
#[derive(Clone)]
pub struct PgRosterStore {
    db: Arc<LazyDatabase>,
}

impl PgRosterStore {
    pub fn new(db: Arc<LazyDatabase>) -> Self {
        Self { db }
    }

    fn decode(id: String, doc: serde_json::Value) -> Result<Profile, StoreError> {
        serde_json::from_value(doc).map_err(|e| StoreError::InvalidDocument {
            id,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RosterStore for PgRosterStore {
    async fn get(&self, id: &UserId) -> Result<Option<Profile>, StoreError> {
        let pool = self.db.pool().await?;
        let doc: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT doc FROM profiles WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(pool)
                .await
                .map_err(query_error)?;

        doc.map(|doc| Self::decode(id.to_string(), doc)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query("SELECT id, doc FROM profiles WHERE lower(email) = lower($1)")
            .bind(email.trim())
            .fetch_optional(pool)
            .await
            .map_err(query_error)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let id: String = row.try_get("id").map_err(query_error)?;
                let doc: serde_json::Value = row.try_get("doc").map_err(query_error)?;
                Self::decode(id, doc).map(Some)
            }
        }
    }

    async fn upsert(&self, profile: Profile) -> Result<(), StoreError> {
        let pool = self.db.pool().await?;
        let doc = serde_json::to_value(&profile).map_err(|e| StoreError::Db(e.into()))?;
        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, role, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email,
                    role = EXCLUDED.role,
                    doc = EXCLUDED.doc
            "#,
        )
        .bind(profile.id.as_str())
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .bind(&doc)
        .execute(pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a101"), "%a101%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("c:\\x"), "%c:\\\\x%");
    }

    #[test]
    fn row_with_mismatched_key_is_rejected() {
        let row = RoomRow {
            id: "A101".into(),
            doc: serde_json::json!({"id": "B202", "capacity": 10}),
            version: 3,
        };
        assert!(matches!(
            row.decode(),
            Err(StoreError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn row_decodes_with_version() {
        let row = RoomRow {
            id: "A101".into(),
            doc: serde_json::json!({"id": "A101", "capacity": 10, "currentCount": 4}),
            version: 3,
        };
        let record = row.decode().unwrap();
        assert_eq!(record.version, ResourceVersion::new(3));
        assert_eq!(record.value.current_count(), 4);
    }

    #[test]
    fn spaced_keys_decode() {
        let row = RoomRow {
            id: "Room 101".into(),
            doc: serde_json::json!({
                "id": "Room 101", "capacity": 10, "occupants": ["Jane Doe"]
            }),
            version: 1,
        };
        let record = row.decode().unwrap();
        assert_eq!(record.value.id.as_str(), "Room 101");
        assert_eq!(record.value.current_count(), 1);
    }

    #[test]
    fn scan_skips_undecodable_rows() {
        let rows = vec![
            RoomRow {
                id: "A101".into(),
                doc: serde_json::json!({"id": "A101", "capacity": 30}),
                version: 1,
            },
            RoomRow {
                id: "BROKEN".into(),
                doc: serde_json::json!({"id": "BROKEN", "capacity": 0}),
                version: 1,
            },
            RoomRow {
                id: "Room 101".into(),
                doc: serde_json::json!({"id": "Room 101", "capacity": 10}),
                version: 2,
            },
        ];
        let ids: Vec<_> = decode_scan(rows)
            .into_iter()
            .map(|record| record.value.id.into_inner())
            .collect();
        assert_eq!(ids, ["A101", "Room 101"]);
    }
}
