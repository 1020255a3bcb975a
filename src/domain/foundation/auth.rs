//! Authentication types for the domain layer.
//!
//! These types represent identity as seen by the realtime service: the
//! user extracted from a validated credential, and the account record
//! loaded afterwards to check its status. They have **no external
//! dependencies** - any token scheme can populate them via the
//! `SessionValidator` port.

use super::UserId;
use thiserror::Error;

/// Authenticated user extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The unique user identifier carried by the token.
    pub id: UserId,

    /// User's email address from the token claims.
    pub email: String,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Lifecycle state of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    /// Parses the stored status string. Only `"active"` admits connections.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("active") {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// User account as loaded from the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub status: AccountStatus,
}

impl UserAccount {
    /// Creates an account record.
    pub fn new(id: UserId, email: impl Into<String>, status: AccountStatus) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: None,
            status,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Authentication errors that can occur during token validation or
/// user lookup.
///
/// These errors are **domain-centric** - they describe what went wrong
/// from the application's perspective, not the token library's.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but the user no longer exists in the system.
    #[error("User not found")]
    UserNotFound,

    /// The user store or token service is unavailable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }
}
