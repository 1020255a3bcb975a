//! Authentication adapters.
//!
//! Implementations of the admission ports:
//!
//! - `jwt` - HS256 shared-secret `SessionValidator` used in production
//! - `mock` - Test implementations that don't require a database or signed tokens

mod jwt;
mod mock;

pub use jwt::JwtSessionValidator;
pub use mock::{MockAuthProvider, MockSessionValidator, MockTenantDirectory};
