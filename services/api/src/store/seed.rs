//! Startup seeding from JSON files.
//!
//! A rooms file is a JSON array of room documents; a roster file is a JSON
//! array of profiles. Both are upserted, so re-seeding an existing store is
//! harmless apart from bumping room versions.

use std::path::Path;

use sentrydash_id::RoomId;
use sentrydash_occupancy::{Profile, Room};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::{RoomStore, RosterStore, StoreError};

/// Seeding errors.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON array")]
    NotAnArray { path: String },

    #[error("entry {index} in {path} is invalid: {message}")]
    InvalidEntry {
        path: String,
        index: usize,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

async fn read_array(path: &Path) -> Result<Vec<Value>, SeedError> {
    let path_str = path.display().to_string();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path_str.clone(),
            source,
        })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
        path: path_str.clone(),
        source,
    })?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(SeedError::NotAnArray { path: path_str }),
    }
}

/// Key for a room document that arrived without an id.
///
/// The trimmed room name is used when it is a valid key; otherwise a fresh
/// `room-<ulid>` is generated.
pub fn derive_room_id(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| RoomId::parse(n).is_ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("room-{}", ulid::Ulid::new().to_string().to_lowercase()))
}

/// Parse room documents, assigning ids where missing.
pub fn parse_rooms(path: &str, items: Vec<Value>) -> Result<Vec<Room>, SeedError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, mut item)| {
            let invalid = |message: String| SeedError::InvalidEntry {
                path: path.to_string(),
                index,
                message,
            };
            let obj = item
                .as_object_mut()
                .ok_or_else(|| invalid("expected a JSON object".to_string()))?;
            let has_id = obj
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !has_id {
                let id = derive_room_id(obj.get("name").and_then(Value::as_str));
                obj.insert("id".to_string(), Value::String(id));
            }
            serde_json::from_value::<Room>(item).map_err(|e| invalid(e.to_string()))
        })
        .collect()
}

/// Load rooms from `path` into `store`. Returns the number of rooms written.
pub async fn seed_rooms(store: &dyn RoomStore, path: &Path) -> Result<usize, SeedError> {
    let path_str = path.display().to_string();
    let rooms = parse_rooms(&path_str, read_array(path).await?)?;
    let count = rooms.len();
    for room in rooms {
        store.upsert(room).await?;
    }
    info!(path = %path_str, count, "Seeded rooms");
    Ok(count)
}

/// Load roster profiles from `path` into `store`.
pub async fn seed_roster(store: &dyn RosterStore, path: &Path) -> Result<usize, SeedError> {
    let path_str = path.display().to_string();
    let items = read_array(path).await?;
    let count = items.len();
    for (index, item) in items.into_iter().enumerate() {
        let profile: Profile =
            serde_json::from_value(item).map_err(|e| SeedError::InvalidEntry {
                path: path_str.clone(),
                index,
                message: e.to_string(),
            })?;
        store.upsert(profile).await?;
    }
    info!(path = %path_str, count, "Seeded roster");
    Ok(count)
}
