use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub mod kinds {
    pub const LIKE: &str = "like";
    pub const MESSAGE: &str = "message";
    pub const USER_ENTERED_SHELTER: &str = "user_entered_shelter";
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub kind: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub from_user_image: String,
    pub shelter_id: Option<String>,
    pub shelter_name: Option<String>,
    pub message: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification that has been decided on but not yet persisted. State
/// changes hand these back to their caller, which records them after the
/// primary write has committed.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub user_id: String,
    pub kind: &'static str,
    pub from_user_id: String,
    pub from_user_name: String,
    pub from_user_image: String,
    pub shelter_id: Option<String>,
    pub shelter_name: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

const NOTIFICATION_COLUMNS: &str =
    "notification_id, user_id, kind, from_user_id, from_user_name, \
     from_user_image, shelter_id, shelter_name, message, read, created_at";

const NOTIFICATION_LIST_LIMIT: i64 = 50;

impl NotificationDraft {
    pub fn user_entered(
        recipient: String,
        actor_id: &str,
        actor_name: &str,
        actor_image: &str,
        shelter_id: &str,
        shelter_name: &str,
    ) -> Self {
        Self {
            user_id: recipient,
            kind: kinds::USER_ENTERED_SHELTER,
            from_user_id: actor_id.to_string(),
            from_user_name: actor_name.to_string(),
            from_user_image: actor_image.to_string(),
            shelter_id: Some(shelter_id.to_string()),
            shelter_name: Some(shelter_name.to_string()),
            message: None,
        }
    }

    pub fn like(recipient: String, actor_id: &str, actor_name: &str, actor_image: &str) -> Self {
        Self {
            user_id: recipient,
            kind: kinds::LIKE,
            from_user_id: actor_id.to_string(),
            from_user_name: actor_name.to_string(),
            from_user_image: actor_image.to_string(),
            shelter_id: None,
            shelter_name: None,
            message: None,
        }
    }

    pub fn message(
        recipient: String,
        actor_id: &str,
        actor_name: &str,
        actor_image: &str,
        text: &str,
    ) -> Self {
        Self {
            user_id: recipient,
            kind: kinds::MESSAGE,
            from_user_id: actor_id.to_string(),
            from_user_name: actor_name.to_string(),
            from_user_image: actor_image.to_string(),
            shelter_id: None,
            shelter_name: None,
            message: Some(text.to_string()),
        }
    }
}

impl Notification {
    pub async fn record(pool: &PgPool, draft: &NotificationDraft) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, kind, from_user_id, from_user_name,
                from_user_image, shelter_id, shelter_name, message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&draft.user_id)
        .bind(draft.kind)
        .bind(&draft.from_user_id)
        .bind(&draft.from_user_name)
        .bind(&draft.from_user_image)
        .bind(&draft.shelter_id)
        .bind(&draft.shelter_name)
        .bind(&draft.message)
        .fetch_one(pool)
        .await
    }

    /// Best-effort dispatch: a failed notification write must never fail the
    /// state change that produced it, so errors are logged and swallowed.
    pub async fn record_all(pool: &PgPool, drafts: &[NotificationDraft]) {
        for draft in drafts {
            if let Err(e) = Self::record(pool, draft).await {
                tracing::warn!(
                    "Failed to record {} notification for {}: {}",
                    draft.kind,
                    draft.user_id,
                    e
                );
            }
        }
    }

    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(NOTIFICATION_LIST_LIMIT)
        .fetch_all(pool)
        .await
    }

    pub async fn unread_count(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Marks one of the recipient's own notifications read. Returns false if
    /// the row does not exist or belongs to someone else.
    pub async fn mark_read(
        pool: &PgPool,
        user_id: &str,
        notification_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE notification_id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(
        pool: &PgPool,
        user_id: &str,
        notification_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE notification_id = $1 AND user_id = $2")
                .bind(notification_id)
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_draft_snapshots_actor_and_shelter() {
        let draft = NotificationDraft::user_entered(
            "recipient-1".to_string(),
            "actor-1",
            "Linoy",
            "https://example.com/pic.jpg",
            "shelter-1",
            "Dizengoff 50",
        );
        assert_eq!(draft.kind, kinds::USER_ENTERED_SHELTER);
        assert_eq!(draft.user_id, "recipient-1");
        assert_eq!(draft.from_user_name, "Linoy");
        assert_eq!(draft.shelter_name.as_deref(), Some("Dizengoff 50"));
        assert!(draft.message.is_none());
    }

    #[test]
    fn like_draft_has_no_shelter() {
        let draft = NotificationDraft::like("recipient-1".to_string(), "actor-1", "Linoy", "");
        assert_eq!(draft.kind, kinds::LIKE);
        assert!(draft.shelter_id.is_none());
        assert!(draft.message.is_none());
    }

    #[test]
    fn message_draft_snapshots_text() {
        let draft =
            NotificationDraft::message("recipient-1".to_string(), "actor-1", "Linoy", "", "hey");
        assert_eq!(draft.kind, kinds::MESSAGE);
        assert_eq!(draft.message.as_deref(), Some("hey"));
    }
}
