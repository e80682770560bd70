use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::utils::{hash_password, verify_password};

pub const PREFERENCES: [&str; 3] = ["women", "men", "both"];

#[derive(Debug, Serialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: String,
    pub profile_image: String,
    pub preference: String,
    pub shelter_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The profile fields other users are allowed to see.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct PublicProfile {
    pub user_id: String,
    pub full_name: String,
    pub bio: String,
    pub profile_image: String,
    pub preference: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub preference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub full_name: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub full_name: String,
    pub token: String,
}

const USER_COLUMNS: &str = "user_id, full_name, email, password_hash, bio, \
                            profile_image, preference, shelter_id, created_at";

impl User {
    pub async fn create(pool: &PgPool, req: RegisterRequest) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;
        let user_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (user_id, full_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user_id)
        .bind(req.full_name.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(&password_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }

    pub async fn update_profile(
        pool: &PgPool,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                bio = COALESCE($3, bio),
                profile_image = COALESCE($4, profile_image),
                preference = COALESCE($5, preference)
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(req.full_name.as_deref().map(str::trim))
        .bind(req.bio.as_deref())
        .bind(req.profile_image.as_deref())
        .bind(req.preference.as_deref())
        .fetch_one(pool)
        .await
    }
}

pub fn valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

pub fn valid_preference(preference: &str) -> bool {
    PREFERENCES.contains(&preference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(valid_email("linoy@example.com"));
        assert!(valid_email("  a@b.co  "));
        assert!(!valid_email("no-at-sign.com"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("user@nodot"));
        assert!(!valid_email("user@.com"));
        assert!(!valid_email("user@example."));
    }

    #[test]
    fn preference_validation() {
        assert!(valid_preference("women"));
        assert!(valid_preference("men"));
        assert!(valid_preference("both"));
        assert!(!valid_preference("all"));
        assert!(!valid_preference(""));
    }
}
