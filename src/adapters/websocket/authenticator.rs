//! Connection admission.
//!
//! Checks a bearer credential and a tenant slug before a socket is
//! upgraded. Failures are ordered: the first applicable one wins, and the
//! cheap presence checks run before any collaborator is called.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::{AuthError, TenantId, TenantLookupError, UserId};
use crate::ports::{AuthProvider, SessionValidator, TenantDirectory};

/// Why a connection attempt was rejected.
///
/// The display strings are sent to the browser in the `401` body.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("missing authentication token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("missing tenant identifier")]
    MissingTenant,

    #[error("invalid tenant")]
    InvalidTenant,

    #[error("tenant is not active")]
    InactiveTenant,

    #[error("user account is not active")]
    InactiveUser,
}

/// Identity admitted for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    pub user_id: UserId,
    pub tenant_id: TenantId,
}

/// Admission gate over the session, user and tenant collaborators.
///
/// Holds no state of its own; concurrent calls only share the
/// collaborators.
#[derive(Clone)]
pub struct Authenticator {
    sessions: Arc<dyn SessionValidator>,
    users: Arc<dyn AuthProvider>,
    tenants: Arc<dyn TenantDirectory>,
}

impl Authenticator {
    pub fn new(
        sessions: Arc<dyn SessionValidator>,
        users: Arc<dyn AuthProvider>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            sessions,
            users,
            tenants,
        }
    }

    /// Admit a connection or say why not.
    pub async fn authenticate(
        &self,
        token: &str,
        tenant_slug: &str,
    ) -> Result<AuthResult, AdmissionError> {
        if token.is_empty() {
            return Err(AdmissionError::MissingToken);
        }
        if tenant_slug.is_empty() {
            return Err(AdmissionError::MissingTenant);
        }

        let identity = self.sessions.validate(token).await.map_err(|e| {
            tracing::debug!(error = %e, "Rejected websocket credential");
            AdmissionError::InvalidToken
        })?;

        let account = self.users.get_user(&identity.id).await.map_err(|e| {
            match &e {
                AuthError::ServiceUnavailable(_) => {
                    tracing::warn!(user_id = %identity.id, error = %e, "User lookup failed during admission")
                }
                _ => tracing::debug!(user_id = %identity.id, error = %e, "Unknown user in token"),
            }
            AdmissionError::InvalidToken
        })?;
        if !account.status.is_active() {
            return Err(AdmissionError::InactiveUser);
        }

        let tenant = self.tenants.find_by_slug(tenant_slug).await.map_err(|e| {
            if let TenantLookupError::ServiceUnavailable(_) = &e {
                tracing::warn!(slug = tenant_slug, error = %e, "Tenant lookup failed during admission");
            }
            AdmissionError::InvalidTenant
        })?;
        if !tenant.status.is_active() {
            return Err(AdmissionError::InactiveTenant);
        }

        Ok(AuthResult {
            user_id: account.id,
            tenant_id: tenant.id,
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
