use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::AdminUser,
    models::{Book, BookResponse},
    services::uploads,
    state::AppState,
};

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    #[sqlx(flatten)]
    book: Book,
    genre_name: String,
}

impl From<BookRow> for BookResponse {
    fn from(row: BookRow) -> Self {
        BookResponse::from_book(row.book, row.genre_name)
    }
}

/// Fields collected from the multipart book form
#[derive(Debug, Default)]
struct BookForm {
    title: Option<String>,
    author: Option<String>,
    genre_id: Option<Uuid>,
    description: Option<String>,
    cover: Option<(Vec<u8>, String)>,
}

async fn read_book_form(mut multipart: Multipart) -> AppResult<BookForm> {
    let mut form = BookForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => form.title = Some(read_text(field).await?),
            "author" => form.author = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "genre" => {
                let raw = read_text(field).await?;
                let id = Uuid::parse_str(&raw)
                    .map_err(|_| AppError::InvalidInput("Invalid genre id".to_string()))?;
                form.genre_id = Some(id);
            }
            "coverImage" => {
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                form.cover = Some((data.to_vec(), content_type));
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))
}

async fn genre_name(state: &AppState, genre_id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM genres WHERE id = $1")
        .bind(genre_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Genre not found".to_string()))
}

/// Lists the catalog with genres resolved, newest first
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let rows = sqlx::query_as::<_, BookRow>(
        r#"
        SELECT b.*, g.name AS genre_name
        FROM books b
        JOIN genres g ON g.id = b.genre_id
        ORDER BY b.created_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let books: Vec<BookResponse> = rows.into_iter().map(BookResponse::from).collect();
    Ok(Json(json!({ "books": books })))
}

/// Fetches a single book by id
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let row = sqlx::query_as::<_, BookRow>(
        r#"
        SELECT b.*, g.name AS genre_name
        FROM books b
        JOIN genres g ON g.id = b.genre_id
        WHERE b.id = $1
        "#,
    )
    .bind(book_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    Ok(Json(json!({ "book": BookResponse::from(row) })))
}

/// Creates a book from a multipart form; the cover image is required
pub async fn create_book(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let form = read_book_form(multipart).await?;

    let (title, author, genre_id, description) =
        match (form.title, form.author, form.genre_id, form.description) {
            (Some(t), Some(a), Some(g), Some(d)) if !t.is_empty() && !a.is_empty() && !d.is_empty() => {
                (t, a, g, d)
            }
            _ => {
                return Err(AppError::InvalidInput(
                    "All fields are required".to_string(),
                ))
            }
        };
    let (cover_data, cover_type) = form
        .cover
        .ok_or_else(|| AppError::InvalidInput("Cover image is required".to_string()))?;

    let name = genre_name(&state, genre_id).await?;
    let cover_image = uploads::save_image(&cover_data, &cover_type, &state.config.upload_dir).await?;

    let book = sqlx::query_as::<_, Book>(
        r#"
        INSERT INTO books (title, author, genre_id, description, cover_image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&author)
    .bind(genre_id)
    .bind(&description)
    .bind(&cover_image)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(book_id = %book.id, "Book created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book created successfully",
            "book": BookResponse::from_book(book, name),
        })),
    ))
}

/// Updates a book; absent form fields keep their current values
pub async fn update_book(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let form = read_book_form(multipart).await?;

    let existing = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    let genre_id = form.genre_id.unwrap_or(existing.genre_id);
    let name = genre_name(&state, genre_id).await?;

    let cover_image = match form.cover {
        Some((data, content_type)) => {
            uploads::save_image(&data, &content_type, &state.config.upload_dir).await?
        }
        None => existing.cover_image,
    };

    let book = sqlx::query_as::<_, Book>(
        r#"
        UPDATE books
        SET title = $1, author = $2, genre_id = $3, description = $4,
            cover_image = $5, updated_at = now()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(form.title.unwrap_or(existing.title))
    .bind(form.author.unwrap_or(existing.author))
    .bind(genre_id)
    .bind(form.description.unwrap_or(existing.description))
    .bind(&cover_image)
    .bind(book_id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(book_id = %book.id, "Book updated");

    Ok(Json(json!({
        "message": "Book updated successfully",
        "book": BookResponse::from_book(book, name),
    })))
}

/// Deletes a book
pub async fn delete_book(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let deleted = sqlx::query_scalar::<_, Uuid>("DELETE FROM books WHERE id = $1 RETURNING id")
        .bind(book_id)
        .fetch_optional(&state.pool)
        .await?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    tracing::info!(book_id = %book_id, "Book deleted");
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}
