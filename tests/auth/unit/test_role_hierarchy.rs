//! Property tests for the role hierarchy and its relationship to the
//! permission matrix: subsumption is a partial order with `system_admin` on
//! top, and a role that subsumes another never holds fewer capabilities.

use assaygate::auth::{Action, PermissionMatrix, Resource, Role};
use proptest::prelude::*;

const ALL_ACTIONS: [Action; 6] = [
    Action::View,
    Action::Create,
    Action::Edit,
    Action::Delete,
    Action::Upload,
    Action::Approve,
];

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

proptest! {
    #[test]
    fn satisfies_is_reflexive(role in role_strategy()) {
        prop_assert!(role.satisfies(role));
    }

    #[test]
    fn satisfies_is_antisymmetric(a in role_strategy(), b in role_strategy()) {
        if a != b {
            prop_assert!(
                !(a.satisfies(b) && b.satisfies(a)),
                "{} and {} subsume each other without being equal", a, b
            );
        }
    }

    #[test]
    fn satisfies_is_transitive(
        a in role_strategy(),
        b in role_strategy(),
        c in role_strategy(),
    ) {
        if a.satisfies(b) && b.satisfies(c) {
            prop_assert!(a.satisfies(c), "{} -> {} -> {} breaks transitivity", a, b, c);
        }
    }

    #[test]
    fn system_admin_is_the_top(role in role_strategy()) {
        prop_assert!(Role::SystemAdmin.satisfies(role));
        if role != Role::SystemAdmin {
            prop_assert!(!role.satisfies(Role::SystemAdmin));
        }
    }

    #[test]
    fn every_role_views_every_resource(role in role_strategy()) {
        let matrix = PermissionMatrix::for_role(role);
        for resource in Resource::ALL {
            prop_assert!(matrix.allows(resource, Action::View));
        }
    }

    #[test]
    fn for_role_is_deterministic(role in role_strategy()) {
        prop_assert_eq!(PermissionMatrix::for_role(role), PermissionMatrix::for_role(role));
    }

    #[test]
    fn subsumption_implies_capability_superset(a in role_strategy(), b in role_strategy()) {
        if a.satisfies(b) {
            let wide = PermissionMatrix::for_role(a);
            let narrow = PermissionMatrix::for_role(b);
            for resource in Resource::ALL {
                for action in ALL_ACTIONS {
                    if narrow.allows(resource, action) {
                        prop_assert!(
                            wide.allows(resource, action),
                            "{} satisfies {} but lacks {} on {}", a, b, action, resource
                        );
                    }
                }
            }
            if narrow.admin {
                prop_assert!(wide.admin);
            }
        }
    }
}
