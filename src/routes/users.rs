use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::AdminUser,
    models::{Role, User, UserResponse},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Lists all registered users (admin only)
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.pool)
        .await?;

    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(json!({ "users": users })))
}

/// Changes a user's role (admin only)
pub async fn update_role(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> AppResult<Json<Value>> {
    let role = match request.role.as_str() {
        "User" => Role::User,
        "Admin" => Role::Admin,
        _ => return Err(AppError::InvalidInput("Invalid role".to_string())),
    };

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET role = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(role)
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, role = ?role, "User role updated");

    Ok(Json(json!({
        "message": "User role updated successfully",
        "user": UserResponse::from(user),
    })))
}
