use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, FromRow)]
pub struct ChatMessage {
    pub message_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message as seen by one side of the conversation.
#[derive(Debug, Serialize, PartialEq)]
pub struct ChatMessageView {
    pub message_id: String,
    pub text: String,
    pub mine: bool,
    pub created_at: DateTime<Utc>,
}

/// One conversation partner with the latest message exchanged.
#[derive(Debug, Serialize, FromRow)]
pub struct ChatSummary {
    pub user_id: String,
    pub user_name: String,
    pub user_image: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

impl ChatMessage {
    pub async fn send(
        pool: &PgPool,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let recipient_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(recipient_id)
                .fetch_one(pool)
                .await?;

        if !recipient_exists {
            return Err(sqlx::Error::Protocol("User not found".into()));
        }

        sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (message_id, sender_id, recipient_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING message_id, sender_id, recipient_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// Full history between two users, oldest first.
    pub async fn history(
        pool: &PgPool,
        viewer_id: &str,
        partner_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT message_id, sender_id, recipient_id, content, created_at
            FROM chat_messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at
            "#,
        )
        .bind(viewer_id)
        .bind(partner_id)
        .fetch_all(pool)
        .await
    }

    /// One row per conversation partner, newest conversation first.
    pub async fn summaries(pool: &PgPool, viewer_id: &str) -> Result<Vec<ChatSummary>, sqlx::Error> {
        sqlx::query_as::<_, ChatSummary>(
            r#"
            SELECT s.user_id, s.user_name, s.user_image, s.last_message, s.last_message_at
            FROM (
                SELECT DISTINCT ON (m.partner_id)
                    m.partner_id AS user_id,
                    u.full_name AS user_name,
                    u.profile_image AS user_image,
                    m.content AS last_message,
                    m.created_at AS last_message_at
                FROM (
                    SELECT CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END
                               AS partner_id,
                           content,
                           created_at
                    FROM chat_messages
                    WHERE sender_id = $1 OR recipient_id = $1
                ) m
                JOIN users u ON u.user_id = m.partner_id
                ORDER BY m.partner_id, m.created_at DESC
            ) s
            ORDER BY s.last_message_at DESC
            "#,
        )
        .bind(viewer_id)
        .fetch_all(pool)
        .await
    }
}

pub fn views_for(messages: Vec<ChatMessage>, viewer_id: &str) -> Vec<ChatMessageView> {
    messages
        .into_iter()
        .map(|m| ChatMessageView {
            mine: m.sender_id == viewer_id,
            message_id: m.message_id,
            text: m.content,
            created_at: m.created_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str, recipient: &str, text: &str) -> ChatMessage {
        ChatMessage {
            message_id: id.to_string(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            content: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn views_mark_own_messages() {
        let messages = vec![
            msg("m1", "alice", "bob", "hi"),
            msg("m2", "bob", "alice", "hey"),
        ];

        let views = views_for(messages, "alice");
        assert!(views[0].mine);
        assert_eq!(views[0].text, "hi");
        assert!(!views[1].mine);
        assert_eq!(views[1].text, "hey");
    }
}
