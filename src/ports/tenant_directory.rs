//! Tenant directory port - resolves public tenant slugs.

use async_trait::async_trait;

use crate::domain::foundation::{Tenant, TenantLookupError};

/// Resolves a tenant from the slug the browser supplies.
///
/// # Contract
///
/// Implementations must:
/// - Return the tenant if the slug is known, whatever its status
/// - Return `TenantLookupError::NotFound` for unknown slugs
/// - Return `TenantLookupError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Tenant, TenantLookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_directory_trait_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn TenantDirectory) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn TenantDirectory>>();
    }
}
