//! Domain layer
//!
//! Pure domain types with zero infrastructure dependencies. Everything here
//! can be constructed and tested without a database, an HTTP stack, or a
//! running identity provider.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe domain identifiers with NewType pattern

pub mod id;

// Re-export main types from each module
pub use id::{IdentityId, OrgId};
