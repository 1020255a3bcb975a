//! Orbit Realtime - tenant-scoped WebSocket fan-out for the Orbit platform
//!
//! This crate pushes server-originated events (notifications, posts,
//! comments, like counts) to browsers over persistent connections,
//! partitioned by tenant and by user.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
