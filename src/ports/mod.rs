//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the realtime core and the outside world. Adapters implement these ports.
//!
//! ## Admission Ports
//!
//! - `SessionValidator` - Validates bearer tokens
//! - `AuthProvider` - Loads user accounts to check their status
//! - `TenantDirectory` - Resolves tenant slugs
//!
//! ## Outbound Ports
//!
//! - `RealtimePublisher` - Fire-and-forget tenant broadcast and direct send

mod auth_provider;
mod realtime_publisher;
mod session_validator;
mod tenant_directory;

pub use auth_provider::AuthProvider;
pub use realtime_publisher::RealtimePublisher;
pub use session_validator::SessionValidator;
pub use tenant_directory::TenantDirectory;
