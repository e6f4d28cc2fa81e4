use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{GenreRef, Shelf, ShelfType},
    services::statistics,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToShelfRequest {
    pub book_id: Uuid,
    pub shelf_type: ShelfType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub pages_read: i32,
    pub total_pages: Option<i32>,
}

/// A shelf entry with its book and genre resolved
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfResponse {
    pub id: Uuid,
    pub shelf_type: ShelfType,
    pub pages_read: i32,
    pub total_pages: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub book: ShelfBookSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfBookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub cover_image: String,
    pub average_rating: f64,
    pub genre: GenreRef,
}

#[derive(Debug, sqlx::FromRow)]
struct ShelfBookRow {
    id: Uuid,
    shelf_type: ShelfType,
    pages_read: i32,
    total_pages: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_id: Uuid,
    title: String,
    author: String,
    cover_image: String,
    average_rating: f64,
    genre_id: Uuid,
    genre_name: String,
}

impl From<ShelfBookRow> for ShelfResponse {
    fn from(row: ShelfBookRow) -> Self {
        Self {
            id: row.id,
            shelf_type: row.shelf_type,
            pages_read: row.pages_read,
            total_pages: row.total_pages,
            created_at: row.created_at,
            updated_at: row.updated_at,
            book: ShelfBookSummary {
                id: row.book_id,
                title: row.title,
                author: row.author,
                cover_image: row.cover_image,
                average_rating: row.average_rating,
                genre: GenreRef {
                    id: row.genre_id,
                    name: row.genre_name,
                },
            },
        }
    }
}

/// Adds a book to the user's shelf, or moves an existing entry
///
/// Moving an entry to wantToRead resets its page progress.
pub async fn add_to_shelf(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<AddToShelfRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let book_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books WHERE id = $1")
        .bind(request.book_id)
        .fetch_one(&state.pool)
        .await?;
    if book_exists == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    let existing = sqlx::query_as::<_, Shelf>(
        "SELECT * FROM shelves WHERE user_id = $1 AND book_id = $2",
    )
    .bind(user.id)
    .bind(request.book_id)
    .fetch_optional(&state.pool)
    .await?;

    if let Some(entry) = existing {
        let pages_read = if request.shelf_type == ShelfType::WantToRead {
            0
        } else {
            entry.pages_read
        };

        let shelf = sqlx::query_as::<_, Shelf>(
            r#"
            UPDATE shelves
            SET shelf_type = $1, pages_read = $2, updated_at = now()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(request.shelf_type)
        .bind(pages_read)
        .bind(entry.id)
        .fetch_one(&state.pool)
        .await?;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": format!("Book moved to {}", request.shelf_type.as_str()),
                "shelf": shelf,
            })),
        ));
    }

    let shelf = sqlx::query_as::<_, Shelf>(
        r#"
        INSERT INTO shelves (user_id, book_id, shelf_type)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(request.book_id)
    .bind(request.shelf_type)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, book_id = %request.book_id, "Book shelved");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book added to shelf",
            "shelf": shelf,
        })),
    ))
}

/// Lists the user's shelves with books and genres resolved, newest first
pub async fn list_shelves(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let rows = sqlx::query_as::<_, ShelfBookRow>(
        r#"
        SELECT s.id, s.shelf_type, s.pages_read, s.total_pages,
               s.created_at, s.updated_at,
               b.id AS book_id, b.title, b.author, b.cover_image, b.average_rating,
               g.id AS genre_id, g.name AS genre_name
        FROM shelves s
        JOIN books b ON b.id = s.book_id
        JOIN genres g ON g.id = b.genre_id
        WHERE s.user_id = $1
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let shelves: Vec<ShelfResponse> = rows.into_iter().map(ShelfResponse::from).collect();
    Ok(Json(json!({ "shelves": shelves })))
}

/// Updates page progress on a shelf entry
///
/// A currentlyReading entry whose pages read reach the page total is
/// moved to the read shelf automatically.
pub async fn update_progress(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(shelf_id): Path<Uuid>,
    Json(request): Json<UpdateProgressRequest>,
) -> AppResult<Json<Value>> {
    if request.pages_read < 0 || request.total_pages.is_some_and(|t| t < 0) {
        return Err(AppError::InvalidInput(
            "Page counts must not be negative".to_string(),
        ));
    }

    let entry = sqlx::query_as::<_, Shelf>(
        "SELECT * FROM shelves WHERE id = $1 AND user_id = $2",
    )
    .bind(shelf_id)
    .bind(user.id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Shelf entry not found".to_string()))?;

    let total_pages = request.total_pages.unwrap_or(entry.total_pages);
    let finished = total_pages > 0
        && request.pages_read >= total_pages
        && entry.shelf_type == ShelfType::CurrentlyReading;
    let shelf_type = if finished {
        ShelfType::Read
    } else {
        entry.shelf_type
    };

    let shelf = sqlx::query_as::<_, Shelf>(
        r#"
        UPDATE shelves
        SET pages_read = $1, total_pages = $2, shelf_type = $3, updated_at = now()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(request.pages_read)
    .bind(total_pages)
    .bind(shelf_type)
    .bind(entry.id)
    .fetch_one(&state.pool)
    .await?;

    if finished {
        tracing::info!(user_id = %user.id, shelf_id = %shelf.id, "Book finished");
    }

    Ok(Json(json!({
        "message": "Progress updated",
        "shelf": shelf,
    })))
}

/// Removes a book from the user's shelf
pub async fn remove_from_shelf(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(shelf_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let deleted = sqlx::query_scalar::<_, Uuid>(
        "DELETE FROM shelves WHERE id = $1 AND user_id = $2 RETURNING id",
    )
    .bind(shelf_id)
    .bind(user.id)
    .fetch_optional(&state.pool)
    .await?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Shelf entry not found".to_string()));
    }

    Ok(Json(json!({ "message": "Book removed from shelf" })))
}

/// Returns the user's reading statistics snapshot
pub async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<statistics::StatisticsSnapshot>> {
    let snapshot = statistics::stats_for_user(&state.pool, user.id, Utc::now()).await?;
    Ok(Json(snapshot))
}
