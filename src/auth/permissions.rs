//! Permission matrix for the screening platform's resource categories.
//!
//! Five resource categories (molecules, libraries, submissions, results,
//! users) each carry a small set of capability flags. Every role starts from
//! the same baseline (view everything, write nothing) and a static grant
//! table layers role-specific deltas on top, so what a role can do is a
//! lookup-and-merge over data rather than branching logic.
//!
//! [`PermissionMatrix::for_role`] is pure and deterministic: the same role
//! always yields the same matrix. Matrices are rebuilt per request from the
//! principal's role and never persisted, so a role change takes effect on the
//! next request.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::auth::roles::Role;
use crate::errors::{AssayGateError, Result};

/// Resource categories permissions are expressed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Molecules,
    Libraries,
    Submissions,
    Results,
    Users,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Molecules,
        Resource::Libraries,
        Resource::Submissions,
        Resource::Results,
        Resource::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Molecules => "molecules",
            Resource::Libraries => "libraries",
            Resource::Submissions => "submissions",
            Resource::Results => "results",
            Resource::Users => "users",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actions a capability set can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Upload,
    Approve,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Upload => "upload",
            Action::Approve => "approve",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const ALL_ACTIONS: &[Action] =
    &[Action::View, Action::Create, Action::Edit, Action::Delete, Action::Upload, Action::Approve];

/// Capability flags for one resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Capability {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub upload: bool,
    pub approve: bool,
}

impl Capability {
    /// The baseline capability: read access only
    pub const VIEW_ONLY: Capability = Capability {
        view: true,
        create: false,
        edit: false,
        delete: false,
        upload: false,
        approve: false,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
            Action::Upload => self.upload,
            Action::Approve => self.approve,
        }
    }

    fn grant(&mut self, action: Action) {
        match action {
            Action::View => self.view = true,
            Action::Create => self.create = true,
            Action::Edit => self.edit = true,
            Action::Delete => self.delete = true,
            Action::Upload => self.upload = true,
            Action::Approve => self.approve = true,
        }
    }
}

/// Per-role capability matrix over all resource categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionMatrix {
    pub molecules: Capability,
    pub libraries: Capability,
    pub submissions: Capability,
    pub results: Capability,
    pub users: Capability,
    /// Administrative surface flag carried by the admin roles
    pub admin: bool,
}

/// Grant deltas applied over the baseline: (resource, actions to enable)
type Grants = &'static [(Resource, &'static [Action])];

/// Static grant table. The admin flag and the deltas fully determine a
/// role's matrix; there is deliberately no other code path that widens
/// capabilities.
fn role_grants(role: Role) -> (bool, Grants) {
    use Action::*;
    use Resource::*;

    match role {
        // Read everything, change nothing
        Role::Auditor => (false, &[]),

        Role::PharmaScientist => (
            false,
            &[(Molecules, &[Create, Edit]), (Libraries, &[Create, Edit]), (Submissions, &[Create])],
        ),

        Role::CroTechnician => (false, &[(Results, &[Upload])]),

        Role::PharmaAdmin => (
            true,
            &[
                (Molecules, &[Create, Edit, Delete]),
                (Libraries, &[Create, Edit, Delete]),
                (Submissions, &[Create, Edit, Delete, Approve]),
                (Users, &[Create, Edit]),
            ],
        ),

        Role::CroAdmin => (
            true,
            &[(Results, &[Upload, Approve, Edit]), (Submissions, &[Edit]), (Users, &[Create, Edit])],
        ),

        Role::SystemAdmin => (
            true,
            &[
                (Molecules, ALL_ACTIONS),
                (Libraries, ALL_ACTIONS),
                (Submissions, ALL_ACTIONS),
                (Results, ALL_ACTIONS),
                (Users, ALL_ACTIONS),
            ],
        ),
    }
}

impl PermissionMatrix {
    /// The all-view, no-write baseline every role starts from
    pub fn baseline() -> Self {
        Self {
            molecules: Capability::VIEW_ONLY,
            libraries: Capability::VIEW_ONLY,
            submissions: Capability::VIEW_ONLY,
            results: Capability::VIEW_ONLY,
            users: Capability::VIEW_ONLY,
            admin: false,
        }
    }

    /// Build the matrix for a role: baseline plus the role's grant deltas.
    pub fn for_role(role: Role) -> Self {
        let mut matrix = Self::baseline();
        let (admin, grants) = role_grants(role);
        matrix.admin = admin;
        for (resource, actions) in grants {
            for action in *actions {
                matrix.capability_mut(*resource).grant(*action);
            }
        }
        matrix
    }

    pub fn capability(&self, resource: Resource) -> &Capability {
        match resource {
            Resource::Molecules => &self.molecules,
            Resource::Libraries => &self.libraries,
            Resource::Submissions => &self.submissions,
            Resource::Results => &self.results,
            Resource::Users => &self.users,
        }
    }

    fn capability_mut(&mut self, resource: Resource) -> &mut Capability {
        match resource {
            Resource::Molecules => &mut self.molecules,
            Resource::Libraries => &mut self.libraries,
            Resource::Submissions => &mut self.submissions,
            Resource::Results => &mut self.results,
            Resource::Users => &mut self.users,
        }
    }

    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.capability(resource).allows(action)
    }
}

/// Require that the matrix allows an action on a resource.
///
/// # Errors
///
/// Returns a `Forbidden` authentication error when the check fails.
pub fn require_permission(
    matrix: &PermissionMatrix,
    resource: Resource,
    action: Action,
) -> Result<()> {
    if matrix.allows(resource, action) {
        Ok(())
    } else {
        Err(AssayGateError::forbidden())
    }
}
