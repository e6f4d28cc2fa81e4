use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::User,
    state::AppState,
};

/// JWT claims carried by access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: Uuid,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Signs an access token for the given user
pub fn create_token(user_id: Uuid, secret: &str, ttl_hours: i64) -> AppResult<String> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Verifies an access token and returns the user id it was issued for
pub fn verify_token(token: &str, secret: &str) -> AppResult<Uuid> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(data.claims.sub)
}

/// Extractor that resolves the acting user from the Authorization header
///
/// Rejects with 401 when the header is missing, the token is invalid, or
/// the user no longer exists.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let user_id = verify_token(token, &state.config.jwt_secret)?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// Extractor that additionally requires the Admin role
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "test-secret", 1).unwrap();
        let decoded = verify_token(&token, "test-secret").unwrap();
        assert_eq!(decoded, user_id);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = create_token(Uuid::new_v4(), "test-secret", 1).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!(verify_token("not-a-token", "test-secret").is_err());
    }
}
