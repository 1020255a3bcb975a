//! Realtime message vocabulary.
//!
//! - [`message`] - The `{type, payload, timestamp}` envelope and its type tag
//! - [`payloads`] - One typed payload per server-originated message type

mod message;
mod payloads;

pub use message::{EventPayload, Message, MessageError, MessageType};
pub use payloads::{
    CommentCreatedPayload, CommentDeletedPayload, ConnectedPayload, LikeTarget,
    LikeUpdatedPayload, NotificationPayload, PostCreatedPayload, PostDeletedPayload,
    PostUpdatedPayload,
};
