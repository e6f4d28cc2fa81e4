use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A book in the catalog
///
/// `average_rating` and `total_reviews` are derived from Approved reviews
/// and recomputed whenever moderation state changes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre_id: Uuid,
    pub description: String,
    pub cover_image: String,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Genre reference embedded in book responses
#[derive(Debug, Clone, Serialize)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// Book representation returned to clients, with the genre resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: GenreRef,
    pub description: String,
    pub cover_image: String,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
}

impl BookResponse {
    pub fn from_book(book: Book, genre_name: String) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            genre: GenreRef {
                id: book.genre_id,
                name: genre_name,
            },
            description: book.description,
            cover_image: book.cover_image,
            average_rating: book.average_rating,
            total_reviews: book.total_reviews,
            created_at: book.created_at,
        }
    }
}
