//! Room scan predicates.

use serde::Deserialize;

use crate::model::{Room, RoomType};

/// Filter for room scans. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    /// Exact room type. `all` is accepted as "any type".
    #[serde(rename = "type", default, deserialize_with = "type_or_all")]
    pub room_type: Option<RoomType>,

    /// Case-insensitive substring of the room name or id.
    #[serde(default)]
    pub search: Option<String>,

    #[serde(default)]
    pub min_capacity: Option<u32>,

    #[serde(default)]
    pub internet: Option<bool>,

    #[serde(default)]
    pub smart_board: Option<bool>,

    /// Minimum free seats.
    #[serde(default)]
    pub min_available: Option<u32>,
}

fn type_or_all<'de, D>(deserializer: D) -> Result<Option<RoomType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.is_empty() && s != "all")
        .map(RoomType::from))
}

impl RoomFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Lowercased search needle, if any non-blank search term was given.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, room: &Room) -> bool {
        if let Some(t) = &self.room_type {
            if &room.room_type != t {
                return false;
            }
        }
        if let Some(needle) = self.needle() {
            let hit = room.name.to_lowercase().contains(&needle)
                || room.id.as_str().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if self.min_capacity.is_some_and(|min| room.capacity() < min) {
            return false;
        }
        if self.internet.is_some_and(|want| room.internet_available != want) {
            return false;
        }
        if self.smart_board.is_some_and(|want| room.smart_board != want) {
            return false;
        }
        if self.min_available.is_some_and(|min| room.available() < min) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Occupancy;
    use sentrydash_id::RoomId;

    fn lab(id: &str, name: &str, capacity: u32, count: u32) -> Room {
        let mut room = Room::new(RoomId::parse(id).unwrap(), name, RoomType::Lab, capacity)
            .unwrap()
            .with_occupancy(Occupancy::Raw(count));
        room.internet_available = true;
        room
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = RoomFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&lab("L1", "Chem Lab", 20, 0)));
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_id() {
        let filter = RoomFilter {
            search: Some("CHEM".into()),
            ..Default::default()
        };
        assert!(filter.matches(&lab("L1", "Chem Lab", 20, 0)));
        assert!(!filter.matches(&lab("L2", "Physics Lab", 20, 0)));

        let by_id = RoomFilter {
            search: Some("l2".into()),
            ..Default::default()
        };
        assert!(by_id.matches(&lab("L2", "Physics Lab", 20, 0)));
    }

    #[test]
    fn numeric_and_flag_predicates() {
        let room = lab("L1", "Chem Lab", 20, 15);
        let filter = RoomFilter {
            room_type: Some(RoomType::Lab),
            min_capacity: Some(20),
            internet: Some(true),
            min_available: Some(5),
            ..Default::default()
        };
        assert!(filter.matches(&room));

        let too_full = RoomFilter {
            min_available: Some(6),
            ..Default::default()
        };
        assert!(!too_full.matches(&room));

        let needs_board = RoomFilter {
            smart_board: Some(true),
            ..Default::default()
        };
        assert!(!needs_board.matches(&room));
    }

    #[test]
    fn all_type_means_any() {
        let filter: RoomFilter = serde_json::from_str(r#"{"type":"all"}"#).unwrap();
        assert!(filter.room_type.is_none());
        let filter: RoomFilter = serde_json::from_str(r#"{"type":"theory"}"#).unwrap();
        assert_eq!(filter.room_type, Some(RoomType::Theory));
    }
}
