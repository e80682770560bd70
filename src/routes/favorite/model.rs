use sqlx::PgPool;

use crate::routes::user::model::PublicProfile;

pub struct Favorite;

impl Favorite {
    /// Adds `favorite_id` to the user's favorites. Returns true only when
    /// the row is newly inserted, so the caller can emit a single like
    /// notification per pair.
    pub async fn add(
        pool: &PgPool,
        user_id: &str,
        favorite_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let target_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(favorite_id)
                .fetch_one(pool)
                .await?;

        if !target_exists {
            return Err(sqlx::Error::Protocol("User not found".into()));
        }

        let result = sqlx::query(
            "INSERT INTO favorites (user_id, favorite_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(favorite_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(
        pool: &PgPool,
        user_id: &str,
        favorite_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND favorite_id = $2")
            .bind(user_id)
            .bind(favorite_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<PublicProfile>, sqlx::Error> {
        sqlx::query_as::<_, PublicProfile>(
            r#"
            SELECT u.user_id, u.full_name, u.bio, u.profile_image, u.preference
            FROM favorites f
            JOIN users u ON u.user_id = f.favorite_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
