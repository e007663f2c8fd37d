//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for domain identifiers so an identity id can never be
//! handed to an API expecting an organization id. Serde and sqlx both see
//! the inner string (`transparent`), so the wrappers ride along in JSON
//! bodies and TEXT columns without custom glue.
//!
//! Identity ids are UUIDs on both auth backends: locally registered accounts
//! get a fresh v4, while provider-managed accounts reuse the provider's
//! subject id, so token subjects resolve through the same store lookups
//! either way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh v4 id.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an id that already exists elsewhere (a database row or a
            /// provider subject). No validation: the source is trusted.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Validate an untrusted string as a UUID before wrapping it.
            pub fn parse(value: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(value).map(|_| Self(value.to_owned()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(
    /// Unique identifier for an identity (local registration or provider subject)
    IdentityId
);

id_newtype!(
    /// Unique identifier for an organization (pharma sponsor or CRO)
    OrgId
);
