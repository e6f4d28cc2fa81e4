use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::{AdminUser, AuthUser},
    models::{Review, ReviewStatus},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub book_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

/// A review with its author and book resolved, for moderation views
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub user: ReviewUserRef,
    pub book: ReviewBookRef,
}

#[derive(Debug, Serialize)]
pub struct ReviewUserRef {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBookRef {
    pub id: Uuid,
    pub title: String,
    pub cover_image: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    rating: i32,
    comment: String,
    status: ReviewStatus,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    user_name: String,
    user_photo: String,
    book_id: Uuid,
    book_title: String,
    book_cover: String,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            rating: row.rating,
            comment: row.comment,
            status: row.status,
            created_at: row.created_at,
            user: ReviewUserRef {
                id: row.user_id,
                name: row.user_name,
                photo: row.user_photo,
            },
            book: ReviewBookRef {
                id: row.book_id,
                title: row.book_title,
                cover_image: row.book_cover,
            },
        }
    }
}

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.rating, r.comment, r.status, r.created_at,
           u.id AS user_id, u.name AS user_name, u.photo AS user_photo,
           b.id AS book_id, b.title AS book_title, b.cover_image AS book_cover
    FROM reviews r
    JOIN users u ON u.id = r.user_id
    JOIN books b ON b.id = r.book_id
"#;

/// Recomputes a book's rating aggregates from its Approved reviews
async fn refresh_book_aggregates(pool: &PgPool, book_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE books
        SET average_rating = COALESCE(
                (SELECT AVG(rating)::float8 FROM reviews
                 WHERE book_id = $1 AND status = $2), 0),
            total_reviews =
                (SELECT COUNT(*) FROM reviews
                 WHERE book_id = $1 AND status = $2),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(book_id)
    .bind(ReviewStatus::Approved)
    .execute(pool)
    .await?;

    Ok(())
}

/// Submits a review; it stays Pending until an admin approves it
pub async fn create_review(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::InvalidInput(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    if request.comment.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "All fields are required".to_string(),
        ));
    }

    let book_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books WHERE id = $1")
        .bind(request.book_id)
        .fetch_one(&state.pool)
        .await?;
    if book_exists == 0 {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    let already = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM reviews WHERE book_id = $1 AND user_id = $2",
    )
    .bind(request.book_id)
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;
    if already > 0 {
        return Err(AppError::Conflict(
            "You already reviewed this book".to_string(),
        ));
    }

    let review = sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (book_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(request.book_id)
    .bind(user.id)
    .bind(request.rating)
    .bind(&request.comment)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(review_id = %review.id, book_id = %review.book_id, "Review submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review submitted successfully",
            "review": review,
        })),
    ))
}

/// Lists every review for moderation (admin only)
pub async fn list_reviews(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let query = format!("{} ORDER BY r.created_at DESC", REVIEW_SELECT);
    let rows = sqlx::query_as::<_, ReviewRow>(&query)
        .fetch_all(&state.pool)
        .await?;

    let reviews: Vec<ReviewResponse> = rows.into_iter().map(ReviewResponse::from).collect();
    Ok(Json(json!({ "reviews": reviews })))
}

/// Lists reviews awaiting moderation (admin only)
pub async fn pending_reviews(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let query = format!("{} WHERE r.status = $1 ORDER BY r.created_at DESC", REVIEW_SELECT);
    let rows = sqlx::query_as::<_, ReviewRow>(&query)
        .bind(ReviewStatus::Pending)
        .fetch_all(&state.pool)
        .await?;

    let reviews: Vec<ReviewResponse> = rows.into_iter().map(ReviewResponse::from).collect();
    Ok(Json(json!({ "reviews": reviews })))
}

/// Approves a review and refreshes the book's rating aggregates
pub async fn approve_review(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let review = sqlx::query_as::<_, Review>(
        "UPDATE reviews SET status = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(ReviewStatus::Approved)
    .bind(review_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    refresh_book_aggregates(&state.pool, review.book_id).await?;

    tracing::info!(review_id = %review.id, book_id = %review.book_id, "Review approved");

    Ok(Json(json!({
        "message": "Review approved successfully",
        "review": review,
    })))
}

/// Deletes a review and refreshes the book's rating aggregates
pub async fn delete_review(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let book_id = sqlx::query_scalar::<_, Uuid>(
        "DELETE FROM reviews WHERE id = $1 RETURNING book_id",
    )
    .bind(review_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    refresh_book_aggregates(&state.pool, book_id).await?;

    Ok(Json(json!({ "message": "Review deleted successfully" })))
}

/// Lists a book's Approved reviews (public)
pub async fn reviews_by_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let query = format!(
        "{} WHERE r.book_id = $1 AND r.status = $2 ORDER BY r.created_at DESC",
        REVIEW_SELECT
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&query)
        .bind(book_id)
        .bind(ReviewStatus::Approved)
        .fetch_all(&state.pool)
        .await?;

    let reviews: Vec<ReviewResponse> = rows.into_iter().map(ReviewResponse::from).collect();
    Ok(Json(json!({ "reviews": reviews })))
}
