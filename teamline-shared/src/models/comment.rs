/// Comment model and database operations
///
/// Comments belong to exactly one task and cascade with it. Creating a
/// comment is one of the two triggers of the activity pipeline; the
/// publish happens in the API handler after the insert returns, never
/// here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Comment model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    /// Unique comment ID
    pub id: Uuid,

    /// Task the comment belongs to
    pub task_id: Uuid,

    /// Author (nulled if the user is deleted)
    pub author_id: Option<Uuid>,

    /// Comment body
    pub content: String,

    /// When the comment was created
    pub created_at: DateTime<Utc>,

    /// When the comment was last edited
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

const COMMENT_COLUMNS: &str = "id, task_id, author_id, content, created_at, updated_at";

impl Comment {
    /// Creates a new comment
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (task_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, task_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(data.task_id)
        .bind(data.author_id)
        .bind(data.content)
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    /// Finds a comment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists all comments, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Lists the comments on a task, oldest first
    pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE task_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Rewrites a comment's body and stamps `updated_at`
    pub async fn update_content(
        pool: &PgPool,
        id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE comments SET content = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(content)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a comment and, via cascade, its attachments
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Checks whether a comment exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
