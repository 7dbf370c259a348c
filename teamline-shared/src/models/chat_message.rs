/// Chat message model and database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Who authored a message in a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human user
    User,

    /// The generation API's reply
    Assistant,

    /// Fixed instruction material
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

/// One message in a session's append-only log
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: Uuid,

    /// Owning session
    pub session_id: Uuid,

    /// Author role
    pub role: ChatRole,

    /// Message text
    pub content: String,

    /// When the message was appended
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Appends a message to a session
    pub async fn create(
        pool: &PgPool,
        session_id: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (session_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, role, content, created_at
            "#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    /// Lists a session's messages oldest-first
    ///
    /// This is the replay order sent to the generation API.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
    }

    /// Counts the messages in a session
    pub async fn count_by_session(pool: &PgPool, session_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_role_as_str() {
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
        assert_eq!(ChatRole::System.as_str(), "system");
    }

    #[test]
    fn test_chat_role_serde() {
        assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), "\"assistant\"");
        let parsed: ChatRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, ChatRole::User);
    }
}
