/// Project model and database operations
///
/// Projects are the root aggregate: deleting one cascades to its tasks
/// and, transitively, their comments and attachments. Membership is a
/// plain association set (`project_members`) with no ownership cascade
/// toward users.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('planned', 'active', 'on-hold', 'completed');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     start_date TIMESTAMPTZ,
///     end_date TIMESTAMPTZ,
///     status project_status NOT NULL DEFAULT 'planned',
///     color VARCHAR(32),
///     icon VARCHAR(64),
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE project_members (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::User;

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    /// Not started yet
    Planned,

    /// In progress
    Active,

    /// Paused
    OnHold,

    /// Finished
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "planned",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on-hold",
            ProjectStatus::Completed => "completed",
        }
    }
}

/// Project model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique project ID
    pub id: Uuid,

    /// Project name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Planned start date
    pub start_date: Option<DateTime<Utc>>,

    /// Planned end date
    pub end_date: Option<DateTime<Utc>>,

    /// Lifecycle status
    pub status: ProjectStatus,

    /// Display color
    pub color: Option<String>,

    /// Display icon
    pub icon: Option<String>,

    /// User who created the project; immutable after creation
    pub created_by: Option<Uuid>,

    /// When the project was created
    pub created_at: DateTime<Utc>,

    /// When the project was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: ProjectStatus,
    pub color: Option<String>,
    pub icon: Option<String>,

    /// Creator; set once, never updated
    pub created_by: Uuid,
}

/// Input for updating a project
///
/// `created_by` is deliberately absent: the creator reference is fixed
/// at creation time. The member set is replaced through
/// [`Project::replace_members`], not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<ProjectStatus>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
}

const PROJECT_COLUMNS: &str = "id, name, description, start_date, end_date, status, color, icon, \
                               created_by, created_at, updated_at";

impl Project {
    /// Creates a new project
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, start_date, end_date, status, color, icon, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, description, start_date, end_date, status, color, icon,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.status)
        .bind(data.color)
        .bind(data.icon)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists all projects, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Checks whether a project exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Updates a project, writing only the fields present in `data`
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.start_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", start_date = ${}", bind_count));
        }
        if data.end_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", end_date = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.color.is_some() {
            bind_count += 1;
            query.push_str(&format!(", color = ${}", bind_count));
        }
        if data.icon.is_some() {
            bind_count += 1;
            query.push_str(&format!(", icon = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {PROJECT_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Project>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(start_date) = data.start_date {
            q = q.bind(start_date);
        }
        if let Some(end_date) = data.end_date {
            q = q.bind(end_date);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(color) = data.color {
            q = q.bind(color);
        }
        if let Some(icon) = data.icon {
            q = q.bind(icon);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a project and, via cascade, everything it owns
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the current members of a project
    ///
    /// The explicit join replaces lazy entity-graph traversal; the
    /// primary key on (project_id, user_id) guarantees distinct rows.
    pub async fn members(pool: &PgPool, project_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.identity_id, u.username, u.email, u.first_name, u.last_name,
                   u.role, u.created_at, u.updated_at
            FROM users u
            JOIN project_members pm ON pm.user_id = u.id
            WHERE pm.project_id = $1
            ORDER BY pm.added_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Adds a single member, ignoring duplicates
    pub async fn add_member(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, user_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Removes a member from a project
    pub async fn remove_member(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
                .bind(project_id)
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the member set wholesale
    ///
    /// Runs in one transaction so a concurrent reader never observes a
    /// half-replaced set.
    pub async fn replace_members(
        pool: &PgPool,
        project_id: Uuid,
        member_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM project_members WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT (project_id, user_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(member_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Checks whether a user is a member of a project
    pub async fn is_member(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_status_as_str() {
        assert_eq!(ProjectStatus::Planned.as_str(), "planned");
        assert_eq!(ProjectStatus::Active.as_str(), "active");
        assert_eq!(ProjectStatus::OnHold.as_str(), "on-hold");
        assert_eq!(ProjectStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_project_status_serde_kebab_case() {
        let json = serde_json::to_string(&ProjectStatus::OnHold).unwrap();
        assert_eq!(json, "\"on-hold\"");
        let parsed: ProjectStatus = serde_json::from_str("\"planned\"").unwrap();
        assert_eq!(parsed, ProjectStatus::Planned);
    }

    #[test]
    fn test_update_project_has_no_creator_field() {
        // UpdateProject carries display/lifecycle fields only; the
        // creator reference cannot be rewritten after creation.
        let update = UpdateProject::default();
        assert!(update.name.is_none());
        assert!(update.status.is_none());
    }
}
