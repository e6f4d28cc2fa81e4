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
    models::Tutorial,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialRequest {
    pub title: String,
    pub youtube_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
}

/// Lists all tutorials, by display order then newest first (public)
pub async fn list_tutorials(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let tutorials = sqlx::query_as::<_, Tutorial>(
        "SELECT * FROM tutorials ORDER BY sort_order, created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "tutorials": tutorials })))
}

/// Fetches a single tutorial (public)
pub async fn get_tutorial(
    State(state): State<AppState>,
    Path(tutorial_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let tutorial = sqlx::query_as::<_, Tutorial>("SELECT * FROM tutorials WHERE id = $1")
        .bind(tutorial_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tutorial not found".to_string()))?;

    Ok(Json(json!({ "tutorial": tutorial })))
}

/// Creates a tutorial (admin only)
pub async fn create_tutorial(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<TutorialRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if request.title.trim().is_empty() || request.youtube_url.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Title and YouTube URL are required".to_string(),
        ));
    }

    let tutorial = sqlx::query_as::<_, Tutorial>(
        r#"
        INSERT INTO tutorials (title, youtube_url, description, sort_order)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&request.title)
    .bind(&request.youtube_url)
    .bind(&request.description)
    .bind(request.order)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(tutorial_id = %tutorial.id, "Tutorial created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Tutorial created successfully",
            "tutorial": tutorial,
        })),
    ))
}

/// Updates a tutorial (admin only)
pub async fn update_tutorial(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(tutorial_id): Path<Uuid>,
    Json(request): Json<TutorialRequest>,
) -> AppResult<Json<Value>> {
    let tutorial = sqlx::query_as::<_, Tutorial>(
        r#"
        UPDATE tutorials
        SET title = $1, youtube_url = $2, description = $3, sort_order = $4,
            updated_at = now()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&request.title)
    .bind(&request.youtube_url)
    .bind(&request.description)
    .bind(request.order)
    .bind(tutorial_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Tutorial not found".to_string()))?;

    Ok(Json(json!({
        "message": "Tutorial updated successfully",
        "tutorial": tutorial,
    })))
}

/// Deletes a tutorial (admin only)
pub async fn delete_tutorial(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(tutorial_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let deleted = sqlx::query_scalar::<_, Uuid>("DELETE FROM tutorials WHERE id = $1 RETURNING id")
        .bind(tutorial_id)
        .fetch_optional(&state.pool)
        .await?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Tutorial not found".to_string()));
    }

    Ok(Json(json!({ "message": "Tutorial deleted successfully" })))
}
