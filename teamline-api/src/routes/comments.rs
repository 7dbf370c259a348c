/// Comment endpoints
///
/// `GET /api/v1/comments`          — list
/// `POST /api/v1/comments`         — create; publishes a comment-added
///                                   event after the insert commits
/// `GET /api/v1/comments/:id`      — fetch one
/// `PUT /api/v1/comments/:id`      — edit the body
/// `DELETE /api/v1/comments/:id`   — delete (cascades to attachments)
/// `GET /api/v1/tasks/:id/comments` — comments on a task, oldest first
///
/// Any authenticated user may comment; the author is always the caller.

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
use teamline_shared::models::comment::{Comment, CreateComment};
use teamline_shared::models::task::Task;

/// Create comment request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    /// Task to comment on; must exist
    pub task_id: Uuid,

    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

/// Edit comment request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

/// Comment response
#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            task_id: comment.task_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Creates a comment and publishes the comment-added event
///
/// The task is resolved before the insert, so a bad task id fails with
/// 404 and nothing — no row, no activity — is written. The event goes
/// out only after the insert has returned.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    authorize(auth.role, Operation::CommentCreate)?;
    request.validate()?;

    if !Task::exists(&state.db, request.task_id).await? {
        return Err(ApiError::NotFound(format!(
            "Task not found: {}",
            request.task_id
        )));
    }

    let comment = Comment::create(
        &state.db,
        CreateComment {
            task_id: request.task_id,
            author_id: auth.user_id,
            content: request.content,
        },
    )
    .await?;

    state.events.publish(DomainEvent::CommentAdded {
        comment_id: comment.id,
    });

    tracing::info!(comment_id = %comment.id, task_id = %comment.task_id, "Comment created");

    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// Lists comments
pub async fn list_comments(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let comments = Comment::list(&state.db, pagination.limit, pagination.offset).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// Fetches one comment
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = Comment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Comment not found: {}", id)))?;

    Ok(Json(comment.into()))
}

/// Lists the comments on a task, oldest first
pub async fn list_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    if !Task::exists(&state.db, task_id).await? {
        return Err(ApiError::NotFound(format!("Task not found: {}", task_id)));
    }

    let comments = Comment::list_by_task(&state.db, task_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// Rewrites a comment's body
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    authorize(auth.role, Operation::CommentUpdate)?;
    request.validate()?;

    let comment = Comment::update_content(&state.db, id, &request.content)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Comment not found: {}", id)))?;

    Ok(Json(comment.into()))
}

/// Deletes a comment
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(auth.role, Operation::CommentDelete)?;

    let deleted = Comment::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Comment not found: {}", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_comment_request_validation() {
        let valid = CreateCommentRequest {
            task_id: Uuid::new_v4(),
            content: "Looks good to me".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty = CreateCommentRequest {
            task_id: Uuid::new_v4(),
            content: String::new(),
        };
        assert!(empty.validate().is_err());

        let too_long = CreateCommentRequest {
            task_id: Uuid::new_v4(),
            content: "x".repeat(10_001),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_comment_response_from_model() {
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            author_id: Some(Uuid::new_v4()),
            content: "Looks good to me".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = CommentResponse::from(comment.clone());
        assert_eq!(response.id, comment.id);
        assert_eq!(response.content, comment.content);
    }
}
