//! HS256 JWT adapter for bearer token validation.
//!
//! Tokens are issued by the platform's login endpoints and signed with a
//! shared secret. This adapter implements the `SessionValidator` port by:
//!
//! 1. Verifying the HS256 signature against the configured secret
//! 2. Validating expiry (`exp`) and requiring a subject (`sub`)
//! 3. Mapping claims to the domain `AuthenticatedUser` type
//!
//! It can also issue tokens with the same secret, which the CLI tooling
//! and tests use.
//!
//! # Example
//!
//! ```ignore
//! use secrecy::SecretString;
//! use orbit_realtime::adapters::auth::JwtSessionValidator;
//!
//! let validator = JwtSessionValidator::new(&SecretString::new(secret), Duration::from_secs(3600));
//! let user = validator.validate("eyJ...").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// JWT claims carried by platform access tokens.
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    user_id: Uuid,

    email: String,

    /// Subject - the user ID as a string
    sub: String,

    /// Expiry timestamp (Unix epoch seconds)
    exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    iat: Option<i64>,
}

/// Shared-secret JWT session validator.
pub struct JwtSessionValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl JwtSessionValidator {
    /// Create a validator for the given signing secret.
    pub fn new(secret: &SecretString, token_ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            token_ttl,
        }
    }

    /// Issue a signed access token for a user.
    pub fn issue(&self, user: &AuthenticatedUser) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id: *user.id.as_uuid(),
            email: user.email.clone(),
            sub: user.id.to_string(),
            exp: now + self.token_ttl.as_secs() as i64,
            iat: Some(now),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign access token: {}", e);
            AuthError::service_unavailable("token signing failed")
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &Self::validation())
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token expired");
                        AuthError::TokenExpired
                    }
                    _ => {
                        tracing::debug!("Token validation failed: {}", e);
                        AuthError::InvalidToken
                    }
                }
            })?;

        let claims = token_data.claims;
        Ok(AuthenticatedUser::new(
            UserId::from_uuid(claims.user_id),
            claims.email,
        ))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
