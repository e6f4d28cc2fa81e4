use serde::Serialize;
use uuid::Uuid;

/// A book genre
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
}
