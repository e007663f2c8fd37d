//! Role hierarchy for the screening platform.
//!
//! Six fixed roles cover both sides of a sponsor/CRO engagement plus the
//! platform operator and read-only compliance access. The hierarchy is a
//! static acyclic table: `system_admin` sits above everything, each org-level
//! admin subsumes its own staff role, and the remaining roles stand alone.
//!
//! ```text
//! system_admin ── pharma_admin ── pharma_scientist
//!             ├── cro_admin ───── cro_technician
//!             └── auditor
//! ```
//!
//! [`Role::satisfies`] is the one subsumption check used everywhere: true on
//! equality, for `system_admin` against anything, and when the required role
//! appears in the holder's transitive inherited set. It is reflexive for
//! every role and needs no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::{AssayGateError, Result};

/// Platform role held by exactly one identity at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator with global override
    SystemAdmin,
    /// Pharma sponsor organization administrator
    PharmaAdmin,
    /// Pharma sponsor bench scientist
    PharmaScientist,
    /// CRO organization administrator
    CroAdmin,
    /// CRO lab technician
    CroTechnician,
    /// Read-only compliance auditor
    Auditor,
}

impl Role {
    /// Every role, in display order
    pub const ALL: [Role; 6] = [
        Role::SystemAdmin,
        Role::PharmaAdmin,
        Role::PharmaScientist,
        Role::CroAdmin,
        Role::CroTechnician,
        Role::Auditor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::PharmaAdmin => "pharma_admin",
            Role::PharmaScientist => "pharma_scientist",
            Role::CroAdmin => "cro_admin",
            Role::CroTechnician => "cro_technician",
            Role::Auditor => "auditor",
        }
    }

    /// Roles this role transitively subsumes, not counting itself.
    pub fn inherited(&self) -> &'static [Role] {
        match self {
            Role::SystemAdmin => &[
                Role::PharmaAdmin,
                Role::PharmaScientist,
                Role::CroAdmin,
                Role::CroTechnician,
                Role::Auditor,
            ],
            Role::PharmaAdmin => &[Role::PharmaScientist],
            Role::CroAdmin => &[Role::CroTechnician],
            Role::PharmaScientist | Role::CroTechnician | Role::Auditor => &[],
        }
    }

    /// Whether this (held) role satisfies a required role: equal, global
    /// `system_admin` override, or the requirement sits in the inherited set.
    /// Reflexive for every role.
    pub fn satisfies(&self, required: Role) -> bool {
        *self == required || *self == Role::SystemAdmin || self.inherited().contains(&required)
    }

    /// Whether this role satisfies at least one of the required roles.
    /// An empty requirement list satisfies nothing.
    pub fn satisfies_any(&self, required: &[Role]) -> bool {
        required.iter().any(|r| self.satisfies(*r))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an invalid role string
#[derive(Debug, thiserror::Error)]
#[error("invalid role: {value}")]
pub struct RoleParseError {
    pub value: String,
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system_admin" => Ok(Role::SystemAdmin),
            "pharma_admin" => Ok(Role::PharmaAdmin),
            "pharma_scientist" => Ok(Role::PharmaScientist),
            "cro_admin" => Ok(Role::CroAdmin),
            "cro_technician" => Ok(Role::CroTechnician),
            "auditor" => Ok(Role::Auditor),
            other => Err(RoleParseError { value: other.to_string() }),
        }
    }
}

/// Require that the held role satisfies the required role.
///
/// # Errors
///
/// Returns a `Forbidden` authentication error when the check fails.
pub fn require_role(held: Role, required: Role) -> Result<()> {
    if held.satisfies(required) {
        Ok(())
    } else {
        Err(AssayGateError::forbidden())
    }
}

/// Require that the held role satisfies at least one of the required roles.
pub fn require_any_role(held: Role, required: &[Role]) -> Result<()> {
    if held.satisfies_any(required) {
        Ok(())
    } else {
        Err(AssayGateError::forbidden())
    }
}
