/// Attachment endpoints
///
/// `POST /api/v1/attachments`                — multipart upload
/// `GET /api/v1/attachments/:id`             — metadata
/// `GET /api/v1/attachments/:id/download-url` — presigned download URL
/// `DELETE /api/v1/attachments/:id`          — remove object, then row
/// `GET /api/v1/tasks/:id/attachments`       — attachments on a task
/// `GET /api/v1/comments/:id/attachments`    — attachments on a comment
///
/// The multipart form carries the file plus exactly one of `task_id` /
/// `comment_id`. Everything is validated before the object store or the
/// database is touched: an empty file or a bad parent combination
/// writes nothing anywhere.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult, ValidationErrorDetail};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use teamline_shared::auth::middleware::AuthContext;
use teamline_shared::auth::policy::{authorize, Operation};
use teamline_shared::models::attachment::{Attachment, CreateAttachment};
use teamline_shared::models::comment::Comment;
use teamline_shared::models::task::Task;

/// Attachment response
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            file_name: attachment.file_name,
            size_bytes: attachment.size_bytes,
            content_type: attachment.content_type,
            task_id: attachment.task_id,
            comment_id: attachment.comment_id,
            uploaded_by: attachment.uploaded_by,
            uploaded_at: attachment.uploaded_at,
        }
    }
}

/// Fields collected from the multipart form
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
    task_id: Option<Uuid>,
    comment_id: Option<Uuid>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                form.file_name = field.file_name().map(|name| name.to_string());
                form.content_type = field.content_type().map(|ct| ct.to_string());
                form.data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?,
                );
            }
            Some("task_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read task_id: {}", e)))?;
                form.task_id = Some(
                    Uuid::parse_str(&text)
                        .map_err(|_| ApiError::BadRequest("Invalid task_id".to_string()))?,
                );
            }
            Some("comment_id") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read comment_id: {}", e))
                })?;
                form.comment_id = Some(
                    Uuid::parse_str(&text)
                        .map_err(|_| ApiError::BadRequest("Invalid comment_id".to_string()))?,
                );
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Uploads a file and records the attachment
pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<AttachmentResponse>)> {
    authorize(auth.role, Operation::AttachmentUpload)?;

    let form = read_form(multipart).await?;

    let data = form
        .data
        .ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;

    if data.is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "file".to_string(),
            message: "Cannot upload an empty file".to_string(),
        }]));
    }

    // Exactly one parent, resolved before anything is written.
    match (form.task_id, form.comment_id) {
        (Some(task_id), None) => {
            if !Task::exists(&state.db, task_id).await? {
                return Err(ApiError::NotFound(format!("Task not found: {}", task_id)));
            }
        }
        (None, Some(comment_id)) => {
            if !Comment::exists(&state.db, comment_id).await? {
                return Err(ApiError::NotFound(format!(
                    "Comment not found: {}",
                    comment_id
                )));
            }
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of task_id and comment_id is required".to_string(),
            ));
        }
    }

    let file_name = form.file_name.unwrap_or_else(|| "upload.bin".to_string());
    let content_type = form
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let object_key = format!("{}_{}", Uuid::new_v4(), file_name);
    let size_bytes = data.len() as i64;

    // Object first; a failed store leaves no dangling row.
    state
        .storage
        .put_object(&object_key, data, &content_type)
        .await?;

    let attachment = Attachment::create(
        &state.db,
        CreateAttachment {
            file_name,
            object_key,
            size_bytes,
            content_type: Some(content_type),
            task_id: form.task_id,
            comment_id: form.comment_id,
            uploaded_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(
        attachment_id = %attachment.id,
        size_bytes,
        "Attachment uploaded"
    );

    Ok((StatusCode::CREATED, Json(attachment.into())))
}

/// Fetches attachment metadata
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AttachmentResponse>> {
    let attachment = Attachment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Attachment not found: {}", id)))?;

    Ok(Json(attachment.into()))
}

/// Download URL response
#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    /// Time-limited presigned URL
    pub url: String,
}

/// Issues a presigned download URL
pub async fn download_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DownloadUrlResponse>> {
    let attachment = Attachment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Attachment not found: {}", id)))?;

    let url = state.storage.presigned_get_url(&attachment.object_key).await?;

    Ok(Json(DownloadUrlResponse { url }))
}

/// Deletes an attachment: storage object first, row second
pub async fn delete_attachment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(auth.role, Operation::AttachmentDelete)?;

    let attachment = Attachment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Attachment not found: {}", id)))?;

    state.storage.delete_object(&attachment.object_key).await?;
    Attachment::delete(&state.db, id).await?;

    tracing::info!(attachment_id = %id, "Attachment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Lists the attachments on a task
pub async fn list_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AttachmentResponse>>> {
    if !Task::exists(&state.db, task_id).await? {
        return Err(ApiError::NotFound(format!("Task not found: {}", task_id)));
    }

    let attachments = Attachment::list_by_task(&state.db, task_id).await?;
    Ok(Json(attachments.into_iter().map(AttachmentResponse::from).collect()))
}

/// Lists the attachments on a comment
pub async fn list_for_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AttachmentResponse>>> {
    if !Comment::exists(&state.db, comment_id).await? {
        return Err(ApiError::NotFound(format!(
            "Comment not found: {}",
            comment_id
        )));
    }

    let attachments = Attachment::list_by_comment(&state.db, comment_id).await?;
    Ok(Json(attachments.into_iter().map(AttachmentResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_response_hides_object_key() {
        // Storage keys are internal; clients get presigned URLs instead.
        let json = serde_json::to_value(AttachmentResponse {
            id: Uuid::new_v4(),
            file_name: "report.pdf".to_string(),
            size_bytes: 1024,
            content_type: Some("application/pdf".to_string()),
            task_id: Some(Uuid::new_v4()),
            comment_id: None,
            uploaded_by: Some(Uuid::new_v4()),
            uploaded_at: Utc::now(),
        })
        .unwrap();

        assert!(json.get("object_key").is_none());
        assert_eq!(json["file_name"], "report.pdf");
    }

    #[test]
    fn test_upload_form_default_is_empty() {
        let form = UploadForm::default();
        assert!(form.data.is_none());
        assert!(form.task_id.is_none());
        assert!(form.comment_id.is_none());
    }
}
