/// Task endpoints
///
/// `GET /api/v1/tasks`                 — list
/// `POST /api/v1/tasks`                — create (project required)
/// `GET /api/v1/tasks/:id`             — fetch one
/// `PUT /api/v1/tasks/:id`             — partial update; publishes a
///                                       task-updated event after the
///                                       write commits
/// `DELETE /api/v1/tasks/:id`          — delete (cascades to comments
///                                       and attachments)
/// `GET /api/v1/tasks/status/:status`  — list by workflow status

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::routes::Pagination;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use teamline_shared::auth::middleware::AuthContext;
use teamline_shared::auth::policy::{authorize, Operation};
use teamline_shared::events::DomainEvent;
use teamline_shared::models::project::Project;
use teamline_shared::models::task::{
    CreateTask, Task, TaskPriority, TaskStatus, TaskType, UpdateTask,
};
use teamline_shared::models::user::User;

/// Create task request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Owning project; must exist
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 255))]
    pub title: String,

    pub description: Option<String>,

    /// Defaults to `medium`
    pub priority: Option<TaskPriority>,

    /// Defaults to `feature`
    pub task_type: Option<TaskType>,

    #[validate(range(min = 0, max = 10000))]
    pub estimated_hours: Option<i32>,

    pub due_date: Option<DateTime<Utc>>,

    /// Optional assignee; must exist when present
    pub assigned_to: Option<Uuid>,
}

/// Update task request; absent fields are left unchanged
///
/// The owning project and the creator are not updatable.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub priority: Option<TaskPriority>,

    pub task_type: Option<TaskType>,

    pub status: Option<TaskStatus>,

    #[validate(range(min = 0, max = 10000))]
    pub estimated_hours: Option<i32>,

    pub due_date: Option<DateTime<Utc>>,

    /// Re-resolved against the user table when present
    pub assigned_to: Option<Uuid>,
}

/// Task response
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub estimated_hours: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            project_id: task.project_id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            task_type: task.task_type,
            status: task.status,
            estimated_hours: task.estimated_hours,
            due_date: task.due_date,
            assigned_to: task.assigned_to,
            created_by: task.created_by,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Creates a task in `todo` status
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    authorize(auth.role, Operation::TaskCreate)?;
    request.validate()?;

    if !Project::exists(&state.db, request.project_id).await? {
        return Err(ApiError::NotFound(format!(
            "Project not found: {}",
            request.project_id
        )));
    }

    if let Some(assignee) = request.assigned_to {
        if User::find_by_id(&state.db, assignee).await?.is_none() {
            return Err(ApiError::NotFound(format!("User not found: {}", assignee)));
        }
    }

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id: request.project_id,
            title: request.title,
            description: request.description,
            priority: request.priority.unwrap_or(TaskPriority::Medium),
            task_type: request.task_type.unwrap_or(TaskType::Feature),
            estimated_hours: request.estimated_hours,
            due_date: request.due_date,
            assigned_to: request.assigned_to,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(task_id = %task.id, project_id = %task.project_id, "Task created");

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// Lists tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = Task::list(&state.db, pagination.limit, pagination.offset).await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// Fetches one task
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", id)))?;

    Ok(Json(task.into()))
}

/// Lists tasks in a workflow status
pub async fn list_tasks_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown task status: {}", status)))?;

    let tasks = Task::list_by_status(&state.db, status).await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// Updates a task and publishes the task-updated event
///
/// The event goes out only after the update has returned, i.e. after
/// the write committed; a failed update publishes nothing.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    authorize(auth.role, Operation::TaskUpdate)?;
    request.validate()?;

    if !Task::exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Task not found: {}", id)));
    }

    if let Some(assignee) = request.assigned_to {
        if User::find_by_id(&state.db, assignee).await?.is_none() {
            return Err(ApiError::NotFound(format!("User not found: {}", assignee)));
        }
    }

    let task = Task::update(
        &state.db,
        id,
        UpdateTask {
            title: request.title,
            description: request.description.map(Some),
            priority: request.priority,
            task_type: request.task_type,
            status: request.status,
            estimated_hours: request.estimated_hours.map(Some),
            due_date: request.due_date.map(Some),
            assigned_to: request.assigned_to.map(Some),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", id)))?;

    state.events.publish(DomainEvent::TaskUpdated { task_id: task.id });

    tracing::info!(task_id = %task.id, "Task updated");

    Ok(Json(task.into()))
}

/// Deletes a task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(auth.role, Operation::TaskDelete)?;

    let deleted = Task::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Task not found: {}", id)));
    }

    tracing::info!(task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateTaskRequest {
        CreateTaskRequest {
            project_id: Uuid::new_v4(),
            title: "Fix login redirect".to_string(),
            description: Some("Users land on a 404 after SSO".to_string()),
            priority: Some(TaskPriority::High),
            task_type: Some(TaskType::Bug),
            estimated_hours: Some(4),
            due_date: None,
            assigned_to: None,
        }
    }

    #[test]
    fn test_create_task_request_validation() {
        assert!(valid_request().validate().is_ok());

        let empty_title = CreateTaskRequest {
            title: String::new(),
            ..valid_request()
        };
        assert!(empty_title.validate().is_err());

        let absurd_estimate = CreateTaskRequest {
            estimated_hours: Some(100_000),
            ..valid_request()
        };
        assert!(absurd_estimate.validate().is_err());
    }

    #[test]
    fn test_update_task_request_allows_empty_body() {
        assert!(UpdateTaskRequest::default().validate().is_ok());
    }

    #[test]
    fn test_task_response_serialization() {
        let response = TaskResponse {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Fix login redirect".to_string(),
            description: None,
            priority: TaskPriority::High,
            task_type: TaskType::Bug,
            status: TaskStatus::InProgress,
            estimated_hours: Some(4),
            due_date: None,
            assigned_to: None,
            created_by: Some(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["task_type"], "bug");
    }
}
