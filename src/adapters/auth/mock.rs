//! Mock admission adapters for testing.
//!
//! These adapters implement the `SessionValidator`, `AuthProvider` and
//! `TenantDirectory` ports for use in tests, avoiding the need for a
//! database or signed tokens. Each one counts its calls so tests can
//! assert that a lookup never happened.
//!
//! # Example
//!
//! ```ignore
//! use orbit_realtime::adapters::auth::{MockAuthProvider, MockSessionValidator};
//!
//! let user_id = UserId::new();
//! let validator = MockSessionValidator::new().with_test_user("valid-token", user_id);
//! let provider = MockAuthProvider::new().with_active_user(user_id);
//!
//! let user = validator.validate("valid-token").await?;
//! assert_eq!(validator.call_count(), 1);
//! ```
//!
//! # Panics
//!
//! Methods may panic if internal locks are poisoned. These adapters are
//! for tests only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{
    AccountStatus, AuthError, AuthenticatedUser, Tenant, TenantId, TenantLookupError,
    TenantStatus, UserAccount, UserId,
};
use crate::ports::{AuthProvider, SessionValidator, TenantDirectory};

/// Mock session validator for testing.
///
/// Stores a map of tokens to users. Tokens not in the map return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    /// Map of valid tokens to their associated users
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    /// Optional error to return for all validations (for error testing)
    force_error: RwLock<Option<AuthError>>,
    calls: AtomicUsize,
}

impl MockSessionValidator {
    /// Creates a new empty mock validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Adds a valid token for the given user id with a generated email.
    pub fn with_test_user(self, token: impl Into<String>, user_id: UserId) -> Self {
        let user = AuthenticatedUser::new(user_id, format!("{}@test.example.com", user_id));
        self.with_user(token, user)
    }

    /// Forces all validations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self.force_error.write().unwrap() = None;
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.tokens.write().unwrap().insert(token.into(), user);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens.write().unwrap().remove(token);
    }

    /// Number of `validate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.force_error.read().unwrap().clone() {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// Mock auth provider for testing.
///
/// Stores a map of user IDs to accounts. Unknown IDs return `UserNotFound`.
#[derive(Debug, Default)]
pub struct MockAuthProvider {
    users: RwLock<HashMap<UserId, UserAccount>>,
    force_error: RwLock<Option<AuthError>>,
    calls: AtomicUsize,
}

impl MockAuthProvider {
    /// Creates a new empty mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account to the provider.
    pub fn with_user(self, user: UserAccount) -> Self {
        self.add_user(user);
        self
    }

    /// Adds an active account with a generated email.
    pub fn with_active_user(self, user_id: UserId) -> Self {
        self.with_user(UserAccount::new(
            user_id,
            format!("{}@test.example.com", user_id),
            AccountStatus::Active,
        ))
    }

    /// Adds an inactive account with a generated email.
    pub fn with_inactive_user(self, user_id: UserId) -> Self {
        self.with_user(UserAccount::new(
            user_id,
            format!("{}@test.example.com", user_id),
            AccountStatus::Inactive,
        ))
    }

    /// Forces all lookups to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Adds an account at runtime.
    pub fn add_user(&self, user: UserAccount) {
        self.users.write().unwrap().insert(user.id, user);
    }

    /// Number of `get_user` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_user(&self, user_id: &UserId) -> Result<UserAccount, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.force_error.read().unwrap().clone() {
            return Err(error);
        }

        self.users
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or(AuthError::UserNotFound)
    }
}

/// Mock tenant directory for testing.
///
/// Stores a map of slugs to tenants. Unknown slugs return `NotFound`.
#[derive(Debug, Default)]
pub struct MockTenantDirectory {
    tenants: RwLock<HashMap<String, Tenant>>,
    calls: AtomicUsize,
}

impl MockTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant keyed by its slug.
    pub fn with_tenant(self, tenant: Tenant) -> Self {
        self.tenants
            .write()
            .unwrap()
            .insert(tenant.slug.clone(), tenant);
        self
    }

    /// Adds an active tenant with the given slug.
    pub fn with_active_tenant(self, slug: &str, tenant_id: TenantId) -> Self {
        self.with_tenant(Tenant::new(tenant_id, slug, slug, TenantStatus::Active))
    }

    /// Adds an inactive tenant with the given slug.
    pub fn with_inactive_tenant(self, slug: &str, tenant_id: TenantId) -> Self {
        self.with_tenant(Tenant::new(tenant_id, slug, slug, TenantStatus::Inactive))
    }

    /// Number of `find_by_slug` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for MockTenantDirectory {
    async fn find_by_slug(&self, slug: &str) -> Result<Tenant, TenantLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        self.tenants
            .read()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or(TenantLookupError::NotFound)
    }
}
