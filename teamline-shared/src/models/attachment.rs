/// Attachment model and database operations
///
/// An attachment is a file stored in the object store plus a row here.
/// Every attachment hangs off exactly one parent — a task or a comment,
/// never both and never neither. The database enforces that with a
/// CHECK constraint; request validation rejects bad combinations before
/// anything touches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Attachment model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    /// Unique attachment ID
    pub id: Uuid,

    /// Original file name as uploaded
    pub file_name: String,

    /// Key of the object in the object store
    pub object_key: String,

    /// File size in bytes
    pub size_bytes: i64,

    /// MIME type reported at upload
    pub content_type: Option<String>,

    /// Parent task (exclusive with `comment_id`)
    pub task_id: Option<Uuid>,

    /// Parent comment (exclusive with `task_id`)
    pub comment_id: Option<Uuid>,

    /// Uploader (nulled if the user is deleted)
    pub uploaded_by: Option<Uuid>,

    /// When the file was uploaded
    pub uploaded_at: DateTime<Utc>,
}

/// Input for recording an uploaded attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttachment {
    pub file_name: String,
    pub object_key: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub task_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub uploaded_by: Uuid,
}

const ATTACHMENT_COLUMNS: &str = "id, file_name, object_key, size_bytes, content_type, \
                                  task_id, comment_id, uploaded_by, uploaded_at";

impl Attachment {
    /// Records an uploaded attachment
    ///
    /// The caller is responsible for having stored the object first;
    /// the CHECK constraint rejects rows without exactly one parent.
    pub async fn create(pool: &PgPool, data: CreateAttachment) -> Result<Self, sqlx::Error> {
        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (file_name, object_key, size_bytes, content_type,
                                     task_id, comment_id, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, file_name, object_key, size_bytes, content_type,
                      task_id, comment_id, uploaded_by, uploaded_at
            "#,
        )
        .bind(data.file_name)
        .bind(data.object_key)
        .bind(data.size_bytes)
        .bind(data.content_type)
        .bind(data.task_id)
        .bind(data.comment_id)
        .bind(data.uploaded_by)
        .fetch_one(pool)
        .await?;

        Ok(attachment)
    }

    /// Finds an attachment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = $1");
        sqlx::query_as::<_, Attachment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists the attachments on a task
    pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE task_id = $1 ORDER BY uploaded_at ASC"
        );
        sqlx::query_as::<_, Attachment>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// Lists the attachments on a comment
    pub async fn list_by_comment(
        pool: &PgPool,
        comment_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE comment_id = $1 ORDER BY uploaded_at ASC"
        );
        sqlx::query_as::<_, Attachment>(&query)
            .bind(comment_id)
            .fetch_all(pool)
            .await
    }

    /// Deletes an attachment row
    ///
    /// The storage object is removed by the caller before this runs.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
