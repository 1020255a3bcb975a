//! PostgreSQL adapters - Database implementations of the admission ports.
//!
//! - `PostgresAuthProvider` - Account lookups from the `users` table
//! - `PostgresTenantDirectory` - Slug resolution from the `tenants` table

mod tenant_directory;
mod user_reader;

pub use tenant_directory::PostgresTenantDirectory;
pub use user_reader::PostgresAuthProvider;
