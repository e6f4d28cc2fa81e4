use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reading state of a shelved book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "shelf_type", rename_all = "camelCase")]
pub enum ShelfType {
    WantToRead,
    CurrentlyReading,
    Read,
}

impl ShelfType {
    /// Wire-format name, as used in client-facing messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ShelfType::WantToRead => "wantToRead",
            ShelfType::CurrentlyReading => "currentlyReading",
            ShelfType::Read => "read",
        }
    }
}

/// A user's association with a book plus page-progress counters
///
/// One entry per (user, book) pair; `updated_at` doubles as the activity
/// date for streak and time-series computations.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shelf {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub shelf_type: ShelfType,
    pub pages_read: i32,
    pub total_pages: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shelf_type_serialization() {
        assert_eq!(
            serde_json::to_string(&ShelfType::WantToRead).unwrap(),
            "\"wantToRead\""
        );
        assert_eq!(
            serde_json::to_string(&ShelfType::CurrentlyReading).unwrap(),
            "\"currentlyReading\""
        );
        assert_eq!(serde_json::to_string(&ShelfType::Read).unwrap(), "\"read\"");
    }

    #[test]
    fn test_shelf_type_deserialization() {
        let parsed: ShelfType = serde_json::from_str("\"currentlyReading\"").unwrap();
        assert_eq!(parsed, ShelfType::CurrentlyReading);
    }
}
