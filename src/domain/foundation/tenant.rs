//! Tenant read model used during connection admission.

use thiserror::Error;

use super::TenantId;

/// Lifecycle state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    /// Parses the stored status string. Only `"active"` admits connections.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("active") {
            TenantStatus::Active
        } else {
            TenantStatus::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TenantStatus::Active)
    }
}

/// A tenant resolved from its public slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    pub slug: String,
    pub name: String,
    pub status: TenantStatus,
}

impl Tenant {
    pub fn new(
        id: TenantId,
        slug: impl Into<String>,
        name: impl Into<String>,
        status: TenantStatus,
    ) -> Self {
        Self {
            id,
            slug: slug.into(),
            name: name.into(),
            status,
        }
    }
}

/// Failures resolving a tenant slug.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantLookupError {
    #[error("Tenant not found")]
    NotFound,

    #[error("Tenant service unavailable: {0}")]
    ServiceUnavailable(String),
}
