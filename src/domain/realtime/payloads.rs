//! Typed payloads, one per server-originated message type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{TenantId, Timestamp, UserId};

use super::message::{EventPayload, MessageType};

/// Sent once when a connection has been admitted and registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub status: String,
    pub user_id: String,
    pub tenant_id: String,
}

impl ConnectedPayload {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            status: "connected".to_string(),
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }
}

impl EventPayload for ConnectedPayload {
    const KIND: MessageType = MessageType::Connected;
}

/// A notification addressed to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl EventPayload for NotificationPayload {
    const KIND: MessageType = MessageType::NotificationNew;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreatedPayload {
    pub id: Uuid,
    pub title: String,
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    pub created_at: Timestamp,
}

impl EventPayload for PostCreatedPayload {
    const KIND: MessageType = MessageType::PostCreated;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdatedPayload {
    pub id: Uuid,
    pub title: String,
    pub updated_at: Timestamp,
}

impl EventPayload for PostUpdatedPayload {
    const KIND: MessageType = MessageType::PostUpdated;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeletedPayload {
    pub id: Uuid,
}

impl EventPayload for PostDeletedPayload {
    const KIND: MessageType = MessageType::PostDeleted;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCreatedPayload {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: UserId,
    pub author_name: String,
    /// Set for replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub created_at: Timestamp,
}

impl EventPayload for CommentCreatedPayload {
    const KIND: MessageType = MessageType::CommentCreated;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDeletedPayload {
    pub id: Uuid,
    pub post_id: Uuid,
}

impl EventPayload for CommentDeletedPayload {
    const KIND: MessageType = MessageType::CommentDeleted;
}

/// What a like was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Post,
    Comment,
}

/// New like count after a like was toggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeUpdatedPayload {
    pub target_type: LikeTarget,
    pub target_id: Uuid,
    pub like_count: i64,
}

impl EventPayload for LikeUpdatedPayload {
    const KIND: MessageType = MessageType::LikeUpdated;
}
