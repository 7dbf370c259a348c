/// Chat session model and database operations
///
/// A session belongs to one user and owns an ordered message log.
/// Sessions are created explicitly or implicitly by the first message
/// and are deleted only by their owner; messages cascade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Chat session model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    /// Unique session ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Display name
    pub name: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Bumped whenever a message lands in the session
    pub updated_at: DateTime<Utc>,
}

const SESSION_COLUMNS: &str = "id, user_id, name, created_at, updated_at";

impl ChatSession {
    /// Creates a new session for a user
    pub async fn create(pool: &PgPool, user_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChatSession>(
            r#"
            INSERT INTO chat_sessions (user_id, name)
            VALUES ($1, $2)
            RETURNING id, user_id, name, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Finds a session by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a session by ID, scoped to its owner
    ///
    /// The ownership check lives in the query so handlers cannot forget
    /// it: another user's session simply does not exist.
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query =
            format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a user's sessions, most recently active first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Bumps the session's `updated_at` to now
    pub async fn touch(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a session (owner-scoped) and, via cascade, its messages
    pub async fn delete_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
