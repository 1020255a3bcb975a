//! Application layer - Producer-facing services.
//!
//! CRUD services call into this layer after their database writes commit;
//! it turns domain events into realtime messages.

mod notifier;

pub use notifier::RealtimeNotifier;
