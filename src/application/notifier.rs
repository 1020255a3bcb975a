//! RealtimeNotifier - typed producer API used by the CRUD services.
//!
//! Each call builds the envelope for one event and hands it to the
//! publisher. Delivery is fire-and-forget: the authoritative state lives
//! in the database and browsers that miss an event catch up on their
//! next fetch.

use std::sync::Arc;

use crate::domain::foundation::{TenantId, UserId};
use crate::domain::realtime::{
    CommentCreatedPayload, CommentDeletedPayload, EventPayload, LikeUpdatedPayload, Message,
    NotificationPayload, PostCreatedPayload, PostDeletedPayload, PostUpdatedPayload,
};
use crate::ports::RealtimePublisher;

/// Publishes domain events to connected browsers.
#[derive(Clone)]
pub struct RealtimeNotifier {
    publisher: Arc<dyn RealtimePublisher>,
}

impl RealtimeNotifier {
    pub fn new(publisher: Arc<dyn RealtimePublisher>) -> Self {
        Self { publisher }
    }

    pub async fn post_created(&self, tenant_id: TenantId, payload: &PostCreatedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    pub async fn post_updated(&self, tenant_id: TenantId, payload: &PostUpdatedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    pub async fn post_deleted(&self, tenant_id: TenantId, payload: &PostDeletedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    pub async fn comment_created(&self, tenant_id: TenantId, payload: &CommentCreatedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    pub async fn comment_deleted(&self, tenant_id: TenantId, payload: &CommentDeletedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    pub async fn like_updated(&self, tenant_id: TenantId, payload: &LikeUpdatedPayload) {
        self.broadcast(tenant_id, payload).await
    }

    /// Deliver a notification to one user's connections within the tenant.
    pub async fn notification_created(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        payload: &NotificationPayload,
    ) {
        if let Some(message) = build(tenant_id, payload) {
            self.publisher.send_to_user(tenant_id, user_id, message).await;
        }
    }

    async fn broadcast<P: EventPayload>(&self, tenant_id: TenantId, payload: &P) {
        if let Some(message) = build(tenant_id, payload) {
            self.publisher.broadcast_to_tenant(tenant_id, message).await;
        }
    }
}

/// A payload that fails to serialize is a producer bug: log it and skip
/// this one send.
fn build<P: EventPayload>(tenant_id: TenantId, payload: &P) -> Option<Message> {
    match Message::from_payload(payload) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::error!(tenant_id = %tenant_id, error = %e, "Dropping realtime event");
            None
        }
    }
}

impl std::fmt::Debug for RealtimeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeNotifier").finish_non_exhaustive()
    }
}
