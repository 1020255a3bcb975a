//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - JWT session validation and in-memory test doubles
//! - `postgres` - User and tenant lookups
//! - `websocket` - Realtime hub, client actors and the upgrade endpoint

pub mod auth;
pub mod postgres;
pub mod websocket;

pub use auth::{JwtSessionValidator, MockAuthProvider, MockSessionValidator, MockTenantDirectory};
pub use postgres::{PostgresAuthProvider, PostgresTenantDirectory};
pub use websocket::{Authenticator, Hub, WebSocketState};
