use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    error::AppResult, middleware::AuthUser, services::recommendations, state::AppState,
};

/// Returns ranked book recommendations for the acting user
pub async fn recommend(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let recommendations = recommendations::recommend_for_user(&state.pool, user.id).await?;
    Ok(Json(json!({ "recommendations": recommendations })))
}
