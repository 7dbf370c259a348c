/// Authentication context and errors
///
/// The API server's auth layer validates the bearer token, resolves the
/// token subject to a local user row, and injects an [`AuthContext`]
/// into request extensions. Handlers extract it with axum's
/// `Extension` extractor.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use teamline_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("acting user: {} ({})", auth.username, auth.user_id)
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Role, User};

/// Authenticated principal, resolved once per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Local user id
    pub user_id: Uuid,

    /// Identity-provider subject from the token
    pub identity_id: Uuid,

    /// Username (also the private notification channel key)
    pub username: String,

    /// Application role taken from the local user record
    pub role: Role,
}

impl AuthContext {
    /// Builds the context from the resolved local user
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            identity_id: user.identity_id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Error type for the authentication layer
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Authorization header absent
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header present but not a Bearer token
    #[error("{0}")]
    InvalidFormat(String),

    /// Token failed validation
    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but no local account matches its subject
    #[error("Unknown principal")]
    UnknownPrincipal,

    /// Lookup of the local account failed
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials").into_response()
            }
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            AuthError::UnknownPrincipal => {
                (StatusCode::UNAUTHORIZED, "Unknown principal").into_response()
            }
            AuthError::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_auth_context_from_user() {
        let user = User {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: None,
            last_name: None,
            role: Role::ProjectManager,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let context = AuthContext::from_user(&user);
        assert_eq!(context.user_id, user.id);
        assert_eq!(context.identity_id, user.identity_id);
        assert_eq!(context.username, "alice");
        assert_eq!(context.role, Role::ProjectManager);
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::UnknownPrincipal.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::DatabaseError("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
