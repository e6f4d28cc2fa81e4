use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::auth::create_token,
    models::{User, UserResponse},
    services::uploads,
    state::AppState,
};

/// bcrypt work factor, matching the original backend
const BCRYPT_COST: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registers a new account from a multipart form (name, email, password, photo)
pub async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let mut name = None;
    let mut email = None;
    let mut password = None;
    let mut photo: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "name" => name = Some(read_text(field).await?),
            "email" => email = Some(read_text(field).await?),
            "password" => password = Some(read_text(field).await?),
            "photo" => {
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(e.to_string()))?;
                photo = Some((data.to_vec(), content_type));
            }
            _ => {}
        }
    }

    let (name, email, password) = match (name, email, password) {
        (Some(n), Some(e), Some(p)) if !n.is_empty() && !e.is_empty() && !p.is_empty() => (n, e, p),
        _ => {
            return Err(AppError::InvalidInput(
                "All fields are required".to_string(),
            ))
        }
    };
    let (photo_data, photo_type) =
        photo.ok_or_else(|| AppError::InvalidInput("Photo is required".to_string()))?;

    let email = email.to_lowercase();
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.pool)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let photo_path = uploads::save_image(&photo_data, &photo_type, &state.config.upload_dir).await?;
    let password_hash = bcrypt::hash(&password, BCRYPT_COST)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, photo)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&photo_path)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": UserResponse::from(user),
        })),
    ))
}

/// Verifies credentials and issues an access token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidInput(
            "All fields are required".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(request.email.to_lowercase())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let valid = bcrypt::verify(&request.password, &user.password_hash)?;
    if !valid {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = create_token(
        user.id,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": UserResponse::from(user),
    })))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))
}
