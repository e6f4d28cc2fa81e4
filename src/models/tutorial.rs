use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A tutorial video shown in the help section
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tutorial {
    pub id: Uuid,
    pub title: String,
    pub youtube_url: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
