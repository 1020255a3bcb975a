//! RealtimePublisher port - the outbound event API consumed by CRUD services.
//!
//! Both calls are fire-and-forget. A successful return means the request
//! was queued, not that any browser received it: clients that are offline
//! simply miss the event and see fresh data on their next fetch.

use async_trait::async_trait;

use crate::domain::foundation::{TenantId, UserId};
use crate::domain::realtime::Message;

#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// Deliver to every connection currently in the tenant's room.
    async fn broadcast_to_tenant(&self, tenant_id: TenantId, message: Message);

    /// Deliver to the user's connections that belong to `tenant_id`.
    ///
    /// Connections of the same user under other tenants never receive it.
    async fn send_to_user(&self, tenant_id: TenantId, user_id: UserId, message: Message);
}
