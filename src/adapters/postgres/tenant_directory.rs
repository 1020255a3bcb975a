//! PostgreSQL implementation of TenantDirectory.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{Tenant, TenantId, TenantLookupError, TenantStatus};
use crate::ports::TenantDirectory;

/// PostgreSQL implementation of the TenantDirectory port.
pub struct PostgresTenantDirectory {
    pool: PgPool,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    slug: String,
    name: String,
    status: String,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant::new(
            TenantId::from_uuid(row.id),
            row.slug,
            row.name,
            TenantStatus::parse(&row.status),
        )
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    async fn find_by_slug(&self, slug: &str) -> Result<Tenant, TenantLookupError> {
        let row: Option<TenantRow> = sqlx::query_as(
            r#"
            SELECT id, slug, name, status
            FROM tenants
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::warn!(slug, error = %e, "Tenant lookup failed");
            TenantLookupError::ServiceUnavailable(format!("Failed to load tenant: {}", e))
        })?;

        row.map(Tenant::from).ok_or(TenantLookupError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_row_maps_status() {
        let tenant = Tenant::from(TenantRow {
            id: Uuid::new_v4(),
            slug: "rustaceans".to_string(),
            name: "Rustaceans".to_string(),
            status: "archived".to_string(),
        });

        assert_eq!(tenant.slug, "rustaceans");
        assert_eq!(tenant.status, TenantStatus::Inactive);
    }
}
