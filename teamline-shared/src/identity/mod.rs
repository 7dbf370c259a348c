/// Identity-provider admin client
///
/// Teamline delegates account and credential management to an external
/// Keycloak-compatible identity provider. This module talks to its
/// admin REST API: inviting users, keeping username/email/role in sync,
/// and deleting accounts. Local `users` rows mirror these accounts and
/// reference them through `identity_id`.
///
/// The invitation email is a courtesy: if triggering it fails the user
/// still exists in the provider, so the failure is logged and swallowed
/// rather than propagated.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use uuid::Uuid;

/// Identity-provider errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A user with this username or email already exists
    #[error("Identity provider reports a conflicting user: {0}")]
    Conflict(String),

    /// The referenced account does not exist in the provider
    #[error("Identity-provider user not found: {0}")]
    NotFound(Uuid),

    /// Any other failure talking to the provider
    #[error("Identity provider call failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Upstream(err.to_string())
    }
}

/// Admin operations Teamline needs from the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates a disabled-password account and triggers an invitation
    /// email; returns the provider-side user id
    async fn invite_user(
        &self,
        username: &str,
        email: &str,
        role: &str,
    ) -> Result<Uuid, IdentityError>;

    /// Pushes username/email/role changes to the provider
    async fn update_user(
        &self,
        identity_id: Uuid,
        username: &str,
        email: &str,
        role: &str,
    ) -> Result<(), IdentityError>;

    /// Deletes the provider-side account
    async fn delete_user(&self, identity_id: Uuid) -> Result<(), IdentityError>;

    /// Checks whether an account with this email exists
    async fn user_exists_by_email(&self, email: &str) -> Result<bool, IdentityError>;

    /// Checks whether an account with this username exists
    async fn user_exists_by_username(&self, username: &str) -> Result<bool, IdentityError>;
}

/// Keycloak admin API configuration
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server, without trailing slash
    pub base_url: String,

    /// Realm holding Teamline's users
    pub realm: String,

    /// Service-account client id used for admin calls
    pub client_id: String,

    /// Service-account client secret
    pub client_secret: String,
}

impl KeycloakConfig {
    /// Loads the Keycloak connection settings from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            base_url: env::var("KEYCLOAK_BASE_URL")
                .map_err(|_| anyhow::anyhow!("KEYCLOAK_BASE_URL environment variable is required"))?,
            realm: env::var("KEYCLOAK_REALM")
                .map_err(|_| anyhow::anyhow!("KEYCLOAK_REALM environment variable is required"))?,
            client_id: env::var("KEYCLOAK_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("KEYCLOAK_CLIENT_ID environment variable is required"))?,
            client_secret: env::var("KEYCLOAK_CLIENT_SECRET").map_err(|_| {
                anyhow::anyhow!("KEYCLOAK_CLIENT_SECRET environment variable is required")
            })?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRepresentation<'a> {
    username: &'a str,
    email: &'a str,
    enabled: bool,
    email_verified: bool,
    required_actions: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRepresentation {
    id: String,
    name: String,
}

/// Keycloak-backed implementation of [`IdentityProvider`]
pub struct KeycloakClient {
    http: reqwest::Client,
    config: KeycloakConfig,
}

impl KeycloakClient {
    pub fn new(config: KeycloakConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/admin/realms/{}{}",
            self.config.base_url, self.config.realm, path
        )
    }

    /// Acquires an admin access token via client credentials
    async fn admin_token(&self) -> Result<String, IdentityError> {
        let url = format!(
            "{}/realms/master/protocol/openid-connect/token",
            self.config.base_url
        );

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn lookup_realm_role(
        &self,
        token: &str,
        role: &str,
    ) -> Result<RoleRepresentation, IdentityError> {
        let response = self
            .http
            .get(self.admin_url(&format!("/roles/{}", role)))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "realm role '{}' lookup returned {}",
                role,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn assign_realm_role(
        &self,
        token: &str,
        user_id: Uuid,
        role: &str,
    ) -> Result<(), IdentityError> {
        let representation = self.lookup_realm_role(token, role).await?;

        let response = self
            .http
            .post(self.admin_url(&format!("/users/{}/role-mappings/realm", user_id)))
            .bearer_auth(token)
            .json(&vec![representation])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "role assignment returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Triggers the invitation email; failures are logged, not returned
    async fn send_invitation_email(&self, token: &str, user_id: Uuid) {
        let result = self
            .http
            .put(self.admin_url(&format!("/users/{}/execute-actions-email", user_id)))
            .bearer_auth(token)
            .json(&vec!["UPDATE_PASSWORD"])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(user_id = %user_id, "Invitation email triggered");
            }
            Ok(response) => {
                tracing::warn!(
                    user_id = %user_id,
                    status = %response.status(),
                    "Invitation email trigger failed"
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Invitation email trigger failed");
            }
        }
    }

    async fn count_users(&self, token: &str, field: &str, value: &str) -> Result<bool, IdentityError> {
        let response = self
            .http
            .get(self.admin_url("/users/count"))
            .bearer_auth(token)
            .query(&[(field, value), ("exact", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "user count returned {}",
                response.status()
            )));
        }

        let count: i64 = response.json().await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn invite_user(
        &self,
        username: &str,
        email: &str,
        role: &str,
    ) -> Result<Uuid, IdentityError> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .post(self.admin_url("/users"))
            .bearer_auth(&token)
            .json(&UserRepresentation {
                username,
                email,
                enabled: true,
                email_verified: false,
                required_actions: vec!["UPDATE_PASSWORD"],
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                // The created user's id is the last segment of Location.
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        IdentityError::Upstream("user created without Location header".to_string())
                    })?;

                let id = location
                    .rsplit('/')
                    .next()
                    .and_then(|segment| Uuid::parse_str(segment).ok())
                    .ok_or_else(|| {
                        IdentityError::Upstream(format!("unparsable Location header: {location}"))
                    })?;

                self.assign_realm_role(&token, id, role).await?;
                self.send_invitation_email(&token, id).await;

                tracing::info!(identity_id = %id, username = %username, "Invited user");
                Ok(id)
            }
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                Err(IdentityError::Conflict(body))
            }
            status => Err(IdentityError::Upstream(format!(
                "user creation returned {status}"
            ))),
        }
    }

    async fn update_user(
        &self,
        identity_id: Uuid,
        username: &str,
        email: &str,
        role: &str,
    ) -> Result<(), IdentityError> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .put(self.admin_url(&format!("/users/{}", identity_id)))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "username": username, "email": email }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                self.assign_realm_role(&token, identity_id, role).await?;
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound(identity_id)),
            StatusCode::CONFLICT => {
                let body = response.text().await.unwrap_or_default();
                Err(IdentityError::Conflict(body))
            }
            status => Err(IdentityError::Upstream(format!(
                "user update returned {status}"
            ))),
        }
    }

    async fn delete_user(&self, identity_id: Uuid) -> Result<(), IdentityError> {
        let token = self.admin_token().await?;

        let response = self
            .http
            .delete(self.admin_url(&format!("/users/{}", identity_id)))
            .bearer_auth(&token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound(identity_id)),
            status => Err(IdentityError::Upstream(format!(
                "user deletion returned {status}"
            ))),
        }
    }

    async fn user_exists_by_email(&self, email: &str) -> Result<bool, IdentityError> {
        let token = self.admin_token().await?;
        self.count_users(&token, "email", email).await
    }

    async fn user_exists_by_username(&self, username: &str) -> Result<bool, IdentityError> {
        let token = self.admin_token().await?;
        self.count_users(&token, "username", username).await
    }
}
