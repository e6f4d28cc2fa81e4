use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::AdminUser,
    models::Genre,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct GenreRequest {
    pub name: String,
}

/// Lists all genres, name ascending
pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(json!({ "genres": genres })))
}

/// Creates a genre (admin only)
pub async fn create_genre(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<GenreRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Genre name is required".to_string(),
        ));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM genres WHERE name = $1")
        .bind(&request.name)
        .fetch_one(&state.pool)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("Genre already exists".to_string()));
    }

    let genre =
        sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
            .bind(&request.name)
            .fetch_one(&state.pool)
            .await?;

    tracing::info!(genre_id = %genre.id, name = %genre.name, "Genre created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Genre created successfully",
            "genre": genre,
        })),
    ))
}

/// Renames a genre (admin only)
pub async fn update_genre(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(genre_id): Path<Uuid>,
    Json(request): Json<GenreRequest>,
) -> AppResult<Json<Value>> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Genre name is required".to_string(),
        ));
    }

    let genre = sqlx::query_as::<_, Genre>(
        "UPDATE genres SET name = $1 WHERE id = $2 RETURNING id, name",
    )
    .bind(&request.name)
    .bind(genre_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Genre not found".to_string()))?;

    Ok(Json(json!({
        "message": "Genre updated successfully",
        "genre": genre,
    })))
}

/// Deletes a genre (admin only)
pub async fn delete_genre(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(genre_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let deleted = sqlx::query_scalar::<_, Uuid>("DELETE FROM genres WHERE id = $1 RETURNING id")
        .bind(genre_id)
        .fetch_optional(&state.pool)
        .await?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Genre not found".to_string()));
    }

    Ok(Json(json!({ "message": "Genre deleted successfully" })))
}
