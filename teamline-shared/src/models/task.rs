/// Task model and database operations
///
/// Tasks always belong to a project (required at creation) and may be
/// assigned to a user. Comments and attachments cascade with the task.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'critical');
/// CREATE TYPE task_type AS ENUM ('feature', 'bug', 'improvement', 'research');
/// CREATE TYPE task_status AS ENUM ('todo', 'in-progress', 'in-review', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority task_priority NOT NULL DEFAULT 'medium',
///     task_type task_type NOT NULL DEFAULT 'feature',
///     status task_status NOT NULL DEFAULT 'todo',
///     estimated_hours INTEGER,
///     due_date TIMESTAMPTZ,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Task kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Feature,
    Bug,
    Improvement,
    Research,
}

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::InReview => "in-review",
            TaskStatus::Done => "done",
        }
    }

    /// Parses a status path segment; unknown values are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in-progress" => Some(TaskStatus::InProgress),
            "in-review" => Some(TaskStatus::InReview),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// Task model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Owning project; required at creation
    pub project_id: Uuid,

    /// Short title
    pub title: String,

    /// Optional long description
    pub description: Option<String>,

    /// Priority
    pub priority: TaskPriority,

    /// Kind of work
    pub task_type: TaskType,

    /// Workflow status
    pub status: TaskStatus,

    /// Rough effort estimate in hours
    pub estimated_hours: Option<i32>,

    /// Due date
    pub due_date: Option<DateTime<Utc>>,

    /// Assignee (nullable)
    pub assigned_to: Option<Uuid>,

    /// Creator (nulled if the user is deleted)
    pub created_by: Option<Uuid>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub estimated_hours: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
}

/// Input for updating a task
///
/// The project and creator references are not part of the blind copy:
/// a task never moves between projects, and `created_by` is fixed.
/// The assignee is re-resolved by the handler before it lands here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub estimated_hours: Option<Option<i32>>,
    pub due_date: Option<Option<DateTime<Utc>>>,

    /// Some(None) unassigns, Some(Some(id)) reassigns
    pub assigned_to: Option<Option<Uuid>>,
}

const TASK_COLUMNS: &str = "id, project_id, title, description, priority, task_type, status, \
                            estimated_hours, due_date, assigned_to, created_by, created_at, updated_at";

impl Task {
    /// Creates a new task in `todo` status
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (project_id, title, description, priority, task_type,
                               estimated_hours, due_date, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, project_id, title, description, priority, task_type, status,
                      estimated_hours, due_date, assigned_to, created_by, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.priority)
        .bind(data.task_type)
        .bind(data.estimated_hours)
        .bind(data.due_date)
        .bind(data.assigned_to)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists all tasks with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Lists tasks belonging to a project
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Lists tasks in a given workflow status
    pub async fn list_by_status(
        pool: &PgPool,
        status: TaskStatus,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(status)
            .fetch_all(pool)
            .await
    }

    /// Updates a task, writing only the fields present in `data`
    ///
    /// Always stamps `updated_at = NOW()`, so a successful update's
    /// timestamp equals the time of the call.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.task_type.is_some() {
            bind_count += 1;
            query.push_str(&format!(", task_type = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.estimated_hours.is_some() {
            bind_count += 1;
            query.push_str(&format!(", estimated_hours = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }
        if data.assigned_to.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assigned_to = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {TASK_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(task_type) = data.task_type {
            q = q.bind(task_type);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(estimated_hours) = data.estimated_hours {
            q = q.bind(estimated_hours);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }
        if let Some(assigned_to) = data.assigned_to {
            q = q.bind(assigned_to);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a task and, via cascade, its comments and attachments
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Checks whether a task exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_as_str() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(TaskStatus::InReview.as_str(), "in-review");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }

    #[test]
    fn test_task_status_parse_round_trip() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::InReview,
            TaskStatus::Done,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("archived"), None);
    }

    #[test]
    fn test_enum_serde_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&TaskPriority::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::to_string(&TaskType::Improvement).unwrap(),
            "\"improvement\""
        );
    }

    #[test]
    fn test_update_task_excludes_project_and_creator() {
        // A task never changes project or creator through an update.
        let update = UpdateTask {
            title: Some("Rename".to_string()),
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        assert!(update.assigned_to.is_none());
        assert!(update.description.is_none());
    }
}
