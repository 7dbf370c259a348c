/// API route handlers
///
/// One module per resource:
///
/// - `health`: health check endpoint
/// - `projects`: project CRUD and membership
/// - `tasks`: task CRUD and by-status listing
/// - `comments`: comment CRUD
/// - `attachments`: upload, download URLs, deletion
/// - `users`: user CRUD, profile, notification history
/// - `chat`: assistant sessions and messages

pub mod attachments;
pub mod chat;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

use serde::Deserialize;

/// Common limit/offset query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    /// Maximum rows to return
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Rows to skip
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let pagination: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(pagination.limit, 50);
        assert_eq!(pagination.offset, 0);
    }
}
