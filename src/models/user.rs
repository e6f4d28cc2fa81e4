use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a registered account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    User,
    Admin,
}

/// A registered user, as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub photo: String,
    pub role: Role,
    pub reading_goal_year: i32,
    pub reading_goal_target: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Yearly reading goal attached to a user profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadingGoal {
    pub year: i32,
    pub target: i32,
}

/// User representation returned to clients; never carries the password hash
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub reading_goal: ReadingGoal,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: user.role,
            reading_goal: ReadingGoal {
                year: user.reading_goal_year,
                target: user.reading_goal_target,
            },
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Jane Reader".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".to_string(),
            photo: "uploads/default-avatar.jpg".to_string(),
            role,
            reading_goal_year: 2024,
            reading_goal_target: 12,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(sample_user(Role::Admin).is_admin());
        assert!(!sample_user(Role::User).is_admin());
    }

    #[test]
    fn test_user_response_omits_password_hash() {
        let response = UserResponse::from(sample_user(Role::User));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["readingGoal"]["target"], 12);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"Admin\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"User\"");
    }
}
