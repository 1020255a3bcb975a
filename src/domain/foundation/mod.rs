//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, value objects, and error types that form the
//! vocabulary of the realtime service.

mod auth;
mod ids;
mod tenant;
mod timestamp;

pub use auth::{AccountStatus, AuthError, AuthenticatedUser, UserAccount};
pub use ids::{ClientId, TenantId, UserId};
pub use tenant::{Tenant, TenantLookupError, TenantStatus};
pub use timestamp::Timestamp;
