/// Bearer-token validation
///
/// Teamline does not issue tokens; the external identity provider does.
/// This module validates the provider's HS256-signed access tokens:
/// signature, expiry, and issuer. The token subject (`sub`) is the
/// provider-side user id, which the auth middleware resolves to a local
/// account; role claims are carried in `roles`.
///
/// # Example
///
/// ```
/// use teamline_shared::auth::jwt::{sign_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new(Uuid::new_v4(), "alice", &["developer"], "https://id.example.com/realms/teamline");
/// let token = sign_token(&claims, "a-secret-of-at-least-32-characters!!")?;
/// let validated = validate_token(&token, "a-secret-of-at-least-32-characters!!", "https://id.example.com/realms/teamline")?;
/// assert_eq!(validated.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Issuer does not match the configured identity provider
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Signature or structure is invalid
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Signing failed (dev/test token minting only)
    #[error("Failed to sign token: {0}")]
    SignError(String),
}

/// Claims carried in an identity-provider access token
///
/// Only the claims Teamline relies on are modeled; anything else in
/// the token is ignored during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity-provider user id
    pub sub: Uuid,

    /// Issuer: the identity-provider realm URL
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Preferred username, when the provider includes it
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Role claims; mapped onto [`crate::models::user::Role`]
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Builds claims with a one-hour expiry
    ///
    /// Production tokens come from the identity provider; this exists
    /// for tests and local tooling.
    pub fn new(subject: Uuid, username: &str, roles: &[&str], issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: subject,
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            preferred_username: Some(username.to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Signs claims with the shared secret (dev/test token minting)
pub fn sign_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::SignError(e.to_string()))
}

/// Validates a bearer token: signature, expiry, and issuer
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::Invalid(e.to_string()),
    })?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long!!";
    const ISSUER: &str = "https://id.example.com/realms/teamline";

    #[test]
    fn test_sign_and_validate_round_trip() {
        let subject = Uuid::new_v4();
        let claims = Claims::new(subject, "alice", &["developer"], ISSUER);

        let token = sign_token(&claims, SECRET).unwrap();
        let validated = validate_token(&token, SECRET, ISSUER).unwrap();

        assert_eq!(validated.sub, subject);
        assert_eq!(validated.preferred_username.as_deref(), Some("alice"));
        assert_eq!(validated.roles, vec!["developer".to_string()]);
    }

    #[test]
    fn test_validate_rejects_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), "alice", &[], ISSUER);
        let token = sign_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, "another-secret-also-32-bytes-long!!!", ISSUER);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_issuer() {
        let claims = Claims::new(Uuid::new_v4(), "alice", &[], "https://elsewhere.example.com");
        let token = sign_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, SECRET, ISSUER);
        assert!(matches!(result, Err(JwtError::InvalidIssuer) | Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_expired_token() {
        let mut claims = Claims::new(Uuid::new_v4(), "alice", &[], ISSUER);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;

        let token = sign_token(&claims, SECRET).unwrap();
        let result = validate_token(&token, SECRET, ISSUER);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let result = validate_token("not-a-token", SECRET, ISSUER);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }
}
