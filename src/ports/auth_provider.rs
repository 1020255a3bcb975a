//! Auth provider port for user account retrieval.
//!
//! A validated token only proves who the caller claims to be. Admission
//! also needs the current account record, because an account may have
//! been suspended after the token was issued.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, UserAccount, UserId};

/// Retrieves user account information from the user store.
///
/// # Contract
///
/// Implementations must:
/// - Return the account if it exists, whatever its status
/// - Return `AuthError::UserNotFound` if the user doesn't exist
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get a user account by its ID.
    async fn get_user(&self, user_id: &UserId) -> Result<UserAccount, AuthError>;
}
