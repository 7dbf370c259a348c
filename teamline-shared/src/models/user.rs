/// User model and database operations
///
/// Users mirror accounts managed by the external identity provider.
/// Credentials never live here; `identity_id` is the provider-side
/// subject carried in bearer tokens, and the auth middleware resolves
/// it to a row in this table.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'project-manager', 'developer');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     identity_id UUID NOT NULL UNIQUE,
///     username VARCHAR(255) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     first_name VARCHAR(255),
///     last_name VARCHAR(255),
///     role user_role NOT NULL DEFAULT 'developer',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Application role assigned to a user
///
/// Role claims in bearer tokens map onto this enum; the authorization
/// policy table decides which roles may perform which operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Full administrative access
    Admin,

    /// May manage projects, tasks and users
    ProjectManager,

    /// May read everything and write comments/attachments
    Developer,
}

impl Role {
    /// Role name as it appears in token claims and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project-manager",
            Role::Developer => "developer",
        }
    }

    /// Parses a role claim string; unknown roles are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "project-manager" => Some(Role::ProjectManager),
            "developer" => Some(Role::Developer),
            _ => None,
        }
    }
}

/// User model representing a local account record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Identity-provider subject for this user
    pub identity_id: Uuid,

    /// Unique username (also the private notification channel key)
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Optional first name
    pub first_name: Option<String>,

    /// Optional last name
    pub last_name: Option<String>,

    /// Application role
    pub role: Role,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Identity-provider subject
    pub identity_id: Uuid,

    /// Username (unique)
    pub username: String,

    /// Email address (unique)
    pub email: String,

    /// Optional first name
    pub first_name: Option<String>,

    /// Optional last name
    pub last_name: Option<String>,

    /// Application role
    pub role: Role,
}

/// Input for updating an existing user
///
/// Only non-None fields are written. Double-Option fields distinguish
/// "leave unchanged" from "clear to NULL".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New username
    pub username: Option<String>,

    /// New email address
    pub email: Option<String>,

    /// New first name (Some(None) clears)
    pub first_name: Option<Option<String>>,

    /// New last name (Some(None) clears)
    pub last_name: Option<Option<String>>,

    /// New role
    pub role: Option<Role>,
}

const USER_COLUMNS: &str =
    "id, identity_id, username, email, first_name, last_name, role, created_at, updated_at";

impl User {
    /// Creates a new user record
    ///
    /// # Errors
    ///
    /// Fails with a unique-constraint violation if the username, email,
    /// or identity id is already taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (identity_id, username, email, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, identity_id, username, email, first_name, last_name, role,
                      created_at, updated_at
            "#,
        )
        .bind(data.identity_id)
        .bind(data.username)
        .bind(data.email)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by identity-provider subject
    ///
    /// Used by the auth middleware to resolve a validated bearer token
    /// to a local account.
    pub async fn find_by_identity_id(
        pool: &PgPool,
        identity_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE identity_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(identity_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by username
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Fetches the users matching the given ids
    ///
    /// Ids with no matching row are silently absent from the result;
    /// callers that need all ids to resolve must compare lengths.
    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Lists users with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Updates a user, writing only the fields present in `data`
    ///
    /// Returns the updated user, or None if the id does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.username.is_some() {
            bind_count += 1;
            query.push_str(&format!(", username = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.first_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", first_name = ${}", bind_count));
        }
        if data.last_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", last_name = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(username) = data.username {
            q = q.bind(username);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(first_name) = data.first_name {
            q = q.bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            q = q.bind(last_name);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a user by ID
    ///
    /// Tasks, comments and activities the user touched keep their rows
    /// with the reference nulled; memberships and chat sessions cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Full display name, falling back to the username
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::ProjectManager.as_str(), "project-manager");
        assert_eq!(Role::Developer.as_str(), "developer");
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in [Role::Admin, Role::ProjectManager, Role::Developer] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_role_serde_kebab_case() {
        let json = serde_json::to_string(&Role::ProjectManager).unwrap();
        assert_eq!(json, "\"project-manager\"");
        let parsed: Role = serde_json::from_str("\"developer\"").unwrap();
        assert_eq!(parsed, Role::Developer);
    }

    #[test]
    fn test_update_user_default_is_empty() {
        let update = UpdateUser::default();
        assert!(update.username.is_none());
        assert!(update.email.is_none());
        assert!(update.first_name.is_none());
        assert!(update.last_name.is_none());
        assert!(update.role.is_none());
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            username: "amira".to_string(),
            email: "amira@example.com".to_string(),
            first_name: None,
            last_name: None,
            role: Role::Developer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = sample_user();
        assert_eq!(user.display_name(), "amira");

        user.first_name = Some("Amira".to_string());
        assert_eq!(user.display_name(), "Amira");

        user.last_name = Some("Haddad".to_string());
        assert_eq!(user.display_name(), "Amira Haddad");
    }
}
