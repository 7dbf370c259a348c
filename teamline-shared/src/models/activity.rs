/// Activity model and database operations
///
/// Activities are insert-only audit records describing a domain event
/// ("comment added", "task updated"). They are written exclusively by
/// the event pipeline, in a transaction independent of the triggering
/// write, and queried as the per-user notification history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Activity record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    /// Unique activity ID
    pub id: Uuid,

    /// Action label, e.g. "comment added"
    pub action: String,

    /// Human-readable description of what happened
    pub details: String,

    /// Task the event refers to
    pub task_id: Option<Uuid>,

    /// Project the event belongs to; recipients resolve through this
    pub project_id: Option<Uuid>,

    /// User who performed the action (nulled if deleted later)
    pub actor_id: Option<Uuid>,

    /// When the activity was recorded
    pub created_at: DateTime<Utc>,
}

/// Input for recording an activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub action: String,
    pub details: String,
    pub task_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
}

const ACTIVITY_COLUMNS: &str = "id, action, details, task_id, project_id, actor_id, created_at";

impl Activity {
    /// Records an activity
    ///
    /// Each call is its own transaction on a fresh pool connection, so
    /// a failure here can neither roll back nor be rolled back by the
    /// write that triggered it.
    pub async fn create(pool: &PgPool, data: CreateActivity) -> Result<Self, sqlx::Error> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (action, details, task_id, project_id, actor_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, action, details, task_id, project_id, actor_id, created_at
            "#,
        )
        .bind(data.action)
        .bind(data.details)
        .bind(data.task_id)
        .bind(data.project_id)
        .bind(data.actor_id)
        .fetch_one(pool)
        .await?;

        Ok(activity)
    }

    /// Finds an activity by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1");
        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists the activities in the projects a user belongs to
    ///
    /// This is the notification-history query: an explicit join over
    /// the membership table, newest first.
    pub async fn list_for_user_projects(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT a.id, a.action, a.details, a.task_id, a.project_id, a.actor_id, a.created_at
            FROM activities a
            JOIN project_members pm ON pm.project_id = a.project_id
            WHERE pm.user_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Lists the activities recorded for a project, newest first
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE project_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, Activity>(&query)
            .bind(project_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Counts activities referencing a task
    pub async fn count_by_task(pool: &PgPool, task_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM activities WHERE task_id = $1")
                .bind(task_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
