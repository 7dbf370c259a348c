/// User endpoints
///
/// `POST /api/v1/users`            — create (invites via identity provider)
/// `GET /api/v1/users`             — list
/// `GET /api/v1/users/:id`         — fetch one
/// `PUT /api/v1/users/:id`         — update (synced to the provider)
/// `DELETE /api/v1/users/:id`      — delete (provider account removed too)
/// `GET /api/v1/users/profile`     — the caller's own record
/// `GET /api/v1/users/notifications` — activity history for the
///                                     caller's projects, newest first
///
/// User management is restricted to admins and project managers by the
/// policy table; reads are open to any authenticated caller.

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
use teamline_shared::identity::IdentityError;
use teamline_shared::models::activity::Activity;
use teamline_shared::models::user::{CreateUser, Role, UpdateUser, User};

/// Create user request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Username, unique across the system
    #[validate(length(min = 3, max = 255))]
    pub username: String,

    /// Email address
    #[validate(email)]
    pub email: String,

    /// Optional first name
    pub first_name: Option<String>,

    /// Optional last name
    pub last_name: Option<String>,

    /// Application role
    pub role: Role,
}

/// Update user request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 255))]
    pub username: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub role: Option<Role>,
}

/// User response shape shared across the API
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Creates a user: provider account first, local mirror second
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    authorize(auth.role, Operation::UserCreate)?;
    request.validate()?;

    tracing::info!(username = %request.username, role = %request.role.as_str(), "Creating user");

    let identity_id = state
        .identity
        .invite_user(&request.username, &request.email, request.role.as_str())
        .await?;

    let user = User::create(
        &state.db,
        CreateUser {
            identity_id,
            username: request.username,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            role: request.role,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Lists users
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = User::list(&state.db, pagination.limit, pagination.offset).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Fetches one user
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;

    Ok(Json(user.into()))
}

/// Updates a user and pushes the change to the identity provider
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    authorize(auth.role, Operation::UserUpdate)?;
    request.validate()?;

    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;

    // The provider is updated first; a provider failure leaves the
    // local row untouched.
    let username = request.username.clone().unwrap_or_else(|| existing.username.clone());
    let email = request.email.clone().unwrap_or_else(|| existing.email.clone());
    let role = request.role.unwrap_or(existing.role);

    state
        .identity
        .update_user(existing.identity_id, &username, &email, role.as_str())
        .await?;

    let updated = User::update(
        &state.db,
        id,
        UpdateUser {
            username: request.username,
            email: request.email,
            first_name: request.first_name.map(Some),
            last_name: request.last_name.map(Some),
            role: request.role,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;

    Ok(Json(updated.into()))
}

/// Deletes a user locally and in the identity provider
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(auth.role, Operation::UserDelete)?;

    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;

    // A provider account that is already gone is not an error here.
    match state.identity.delete_user(existing.identity_id).await {
        Ok(()) => {}
        Err(IdentityError::NotFound(identity_id)) => {
            tracing::warn!(identity_id = %identity_id, "Provider account already absent");
        }
        Err(e) => return Err(e.into()),
    }

    User::delete(&state.db, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own record
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(user.into()))
}

/// Activity history across the caller's projects
pub async fn notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<Activity>>> {
    let activities =
        Activity::list_for_user_projects(&state.db, auth.user_id, pagination.limit).await?;

    Ok(Json(activities))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_request_validation() {
        let valid = CreateUserRequest {
            username: "amira".to_string(),
            email: "amira@example.com".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Developer,
        };
        assert!(valid.validate().is_ok());

        let short_username = CreateUserRequest {
            username: "ab".to_string(),
            ..valid.clone()
        };
        assert!(short_username.validate().is_err());

        let bad_email = CreateUserRequest {
            email: "not-an-email".to_string(),
            ..valid
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_update_user_request_validates_present_fields_only() {
        let empty = UpdateUserRequest::default();
        assert!(empty.validate().is_ok());

        let bad_email = UpdateUserRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_user_response_omits_identity_id() {
        // The provider-side id stays internal.
        let json = serde_json::to_value(UserResponse {
            id: Uuid::new_v4(),
            username: "amira".to_string(),
            email: "amira@example.com".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Developer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .unwrap();

        assert!(json.get("identity_id").is_none());
        assert_eq!(json["role"], "developer");
    }
}
