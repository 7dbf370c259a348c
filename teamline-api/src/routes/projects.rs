/// Project endpoints
///
/// `GET /api/v1/projects`              — list
/// `POST /api/v1/projects`             — create
/// `GET /api/v1/projects/:id`          — fetch one, with members
/// `PUT /api/v1/projects/:id`          — update; member set replaced
///                                       wholesale when `member_ids` is
///                                       present
/// `DELETE /api/v1/projects/:id`       — delete (cascades to tasks)
/// `GET /api/v1/projects/:id/members`  — list members
/// `POST /api/v1/projects/:id/members` — invite a new user into the
///                                       project
///
/// Mutations require the admin or project-manager role. The creator
/// reference is set once at creation and never touched by updates.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::routes::users::UserResponse;
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
use teamline_shared::models::project::{CreateProject, Project, ProjectStatus, UpdateProject};
use teamline_shared::models::user::{CreateUser, Role, User};

/// Create project request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    /// Defaults to `planned`
    pub status: Option<ProjectStatus>,

    #[validate(length(max = 32))]
    pub color: Option<String>,

    #[validate(length(max = 64))]
    pub icon: Option<String>,

    /// Initial member set; every id must resolve to an existing user
    pub member_ids: Option<Vec<Uuid>>,
}

/// Update project request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub description: Option<String>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    pub status: Option<ProjectStatus>,

    #[validate(length(max = 32))]
    pub color: Option<String>,

    #[validate(length(max = 64))]
    pub icon: Option<String>,

    /// When present, replaces the member set wholesale
    pub member_ids: Option<Vec<Uuid>>,
}

/// Request to invite a new user straight into a project
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(length(min = 3, max = 255))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    pub role: Role,
}

/// Project response
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: ProjectStatus,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Present on single-project responses; omitted from listings to
    /// keep them one query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<UserResponse>>,
}

impl ProjectResponse {
    fn from_project(project: Project, members: Option<Vec<User>>) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            start_date: project.start_date,
            end_date: project.end_date,
            status: project.status,
            color: project.color,
            icon: project.icon,
            created_by: project.created_by,
            created_at: project.created_at,
            updated_at: project.updated_at,
            members: members.map(|users| users.into_iter().map(UserResponse::from).collect()),
        }
    }
}

/// Resolves member ids to users, failing when any id is unknown
async fn resolve_members(state: &AppState, ids: &[Uuid]) -> ApiResult<Vec<User>> {
    let users = User::find_by_ids(&state.db, ids).await?;

    if users.len() != ids.len() {
        return Err(ApiError::NotFound(
            "One or more member ids do not exist".to_string(),
        ));
    }

    Ok(users)
}

/// Creates a project with an optional initial member set
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    authorize(auth.role, Operation::ProjectCreate)?;
    request.validate()?;

    // Required foreign keys are resolved before anything is written.
    let member_ids = request.member_ids.unwrap_or_default();
    resolve_members(&state, &member_ids).await?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: request.name,
            description: request.description,
            start_date: request.start_date,
            end_date: request.end_date,
            status: request.status.unwrap_or(ProjectStatus::Planned),
            color: request.color,
            icon: request.icon,
            created_by: auth.user_id,
        },
    )
    .await?;

    if !member_ids.is_empty() {
        Project::replace_members(&state.db, project.id, &member_ids).await?;
    }

    tracing::info!(project_id = %project.id, created_by = %auth.user_id, "Project created");

    let members = Project::members(&state.db, project.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse::from_project(project, Some(members))),
    ))
}

/// Lists projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = Project::list(&state.db, pagination.limit, pagination.offset).await?;

    Ok(Json(
        projects
            .into_iter()
            .map(|project| ProjectResponse::from_project(project, None))
            .collect(),
    ))
}

/// Fetches one project with its member set
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project not found: {}", id)))?;

    let members = Project::members(&state.db, id).await?;
    Ok(Json(ProjectResponse::from_project(project, Some(members))))
}

/// Updates a project; a present `member_ids` replaces the member set
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    authorize(auth.role, Operation::ProjectUpdate)?;
    request.validate()?;

    if !Project::exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Project not found: {}", id)));
    }

    if let Some(ref member_ids) = request.member_ids {
        resolve_members(&state, member_ids).await?;
        Project::replace_members(&state.db, id, member_ids).await?;
    }

    let project = Project::update(
        &state.db,
        id,
        UpdateProject {
            name: request.name,
            description: request.description.map(Some),
            start_date: request.start_date.map(Some),
            end_date: request.end_date.map(Some),
            status: request.status,
            color: request.color.map(Some),
            icon: request.icon.map(Some),
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Project not found: {}", id)))?;

    let members = Project::members(&state.db, id).await?;
    Ok(Json(ProjectResponse::from_project(project, Some(members))))
}

/// Deletes a project and everything it owns
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(auth.role, Operation::ProjectDelete)?;

    let deleted = Project::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Project not found: {}", id)));
    }

    tracing::info!(project_id = %id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Lists a project's members
pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    if !Project::exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Project not found: {}", id)));
    }

    let members = Project::members(&state.db, id).await?;
    Ok(Json(members.into_iter().map(UserResponse::from).collect()))
}

/// Invites a brand-new user and adds them to the project
///
/// Creates the identity-provider account (which sends the invitation
/// email), mirrors it locally, then adds the membership.
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    authorize(auth.role, Operation::ProjectAddMember)?;
    request.validate()?;

    if !Project::exists(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Project not found: {}", id)));
    }

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
            first_name: None,
            last_name: None,
            role: request.role,
        },
    )
    .await?;

    Project::add_member(&state.db, id, user.id).await?;

    tracing::info!(project_id = %id, user_id = %user.id, "Member invited into project");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_project_request_validation() {
        let valid = CreateProjectRequest {
            name: "Website relaunch".to_string(),
            description: None,
            start_date: None,
            end_date: None,
            status: None,
            color: Some("#ff8800".to_string()),
            icon: None,
            member_ids: None,
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateProjectRequest {
            name: String::new(),
            ..valid.clone()
        };
        assert!(empty_name.validate().is_err());

        let long_color = CreateProjectRequest {
            color: Some("x".repeat(33)),
            ..valid
        };
        assert!(long_color.validate().is_err());
    }

    #[test]
    fn test_update_request_allows_empty_body() {
        assert!(UpdateProjectRequest::default().validate().is_ok());
    }

    #[test]
    fn test_project_response_listing_omits_members() {
        let project = Project {
            id: Uuid::new_v4(),
            name: "Website relaunch".to_string(),
            description: None,
            start_date: None,
            end_date: None,
            status: ProjectStatus::Active,
            color: None,
            icon: None,
            created_by: Some(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(ProjectResponse::from_project(project, None)).unwrap();
        assert!(json.get("members").is_none());
        assert_eq!(json["status"], "active");
    }
}
