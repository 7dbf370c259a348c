/// Configuration management for the API server
///
/// Loads the server's own settings from environment variables into a
/// typed struct. The external-collaborator clients (identity provider,
/// object store, generation API) keep their `from_env` constructors
/// next to their implementations in `teamline-shared`.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: bind host (default: 0.0.0.0)
/// - `API_PORT`: bind port (default: 8080)
/// - `API_CORS_ORIGINS`: comma-separated origins, `*` for permissive
/// - `API_PRODUCTION`: enable HSTS and strict headers (default: false)
/// - `AUTH_JWT_SECRET`: shared secret for token validation (required)
/// - `AUTH_ISSUER`: expected token issuer, the provider realm URL (required)
/// - `REDIS_URL`: notification transport (required)
/// - `RUST_LOG`: log filter (default: info)

use serde::{Deserialize, Serialize};
use std::env;

/// Complete API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token validation configuration
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` enables permissive CORS
    pub cors_origins: Vec<String>,

    /// Production hardening (HSTS etc.)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,
}

/// Token validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs access tokens with
    ///
    /// Must be at least 32 bytes. Generate with `openssl rand -hex 32`.
    pub secret: String,

    /// Expected `iss` claim — the identity-provider realm URL
    pub issuer: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("API_CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = env::var("API_PRODUCTION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let secret = env::var("AUTH_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("AUTH_JWT_SECRET environment variable is required"))?;

        if secret.len() < 32 {
            anyhow::bail!("AUTH_JWT_SECRET must be at least 32 characters long");
        }

        let issuer = env::var("AUTH_ISSUER")
            .map_err(|_| anyhow::anyhow!("AUTH_ISSUER environment variable is required"))?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig { secret, issuer },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/teamline_test".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                secret: "test-secret-key-at-least-32-bytes-long!!".to_string(),
                issuer: "https://id.example.com/realms/teamline".to_string(),
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample_config().bind_address(), "127.0.0.1:8080");
    }
}
