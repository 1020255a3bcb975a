//! Domain layer containing realtime vocabulary and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, identity, tenants)
//! - `realtime` - The realtime message envelope and its typed payloads

pub mod foundation;
pub mod realtime;
