//! WebSocket adapters for realtime fan-out.
//!
//! Pushes server-originated events to browsers, partitioned by tenant and
//! by user.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  CRUD services (RealtimeNotifier)                    │
//! │        broadcast_to_tenant(tenant, msg) │ send_to_user(tenant, user) │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ bounded command queue
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Hub loop                                │
//! │   tenant rooms: tenant → {client}    user channels: user → {client} │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ try_send (drop newest when full)
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Client: outbound queue → write pump → socket         │
//! │                         socket → read pump (ping → pong)             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`authenticator`] - Admission gate over credential and tenant slug
//! - [`client`] - Per-connection actor with read and write pumps
//! - [`hub`] - Registry and router driven by a single event loop
//! - [`handler`] - Axum upgrade handler and diagnostics route
//! - [`frame`] - Transport frames the pumps read and write

pub mod authenticator;
pub mod client;
pub mod frame;
pub mod handler;
pub mod hub;

pub use authenticator::{AdmissionError, AuthResult, Authenticator};
pub use client::{Client, ClientSettings, OutboundQueue};
pub use frame::{Frame, TransportError, CLOSE_NORMAL};
pub use handler::{websocket_router, ws_handler, ConnectParams, HubStats, WebSocketState};
pub use hub::{Hub, HubState};
