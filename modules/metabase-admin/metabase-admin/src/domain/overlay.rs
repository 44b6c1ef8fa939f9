//! Pure permission graph transformations.
//!
//! Nothing here performs I/O; every function is deterministic because the
//! graph is made of ordered maps.

use std::collections::BTreeMap;

use metabase_admin_sdk::{
    ALL_USERS_GROUP, AccessSpec, CollectionAccess, CollectionId, GroupPermissions, Permission,
    PermissionGraph,
};

/// The entries `spec` dictates for `target`.
///
/// Explicit grants of reserved groups are skipped; the all-users group always
/// receives the default access.
#[must_use]
pub fn overlay(target: &CollectionId, spec: &AccessSpec) -> GroupPermissions {
    let mut groups = GroupPermissions::new();
    for (group, permission) in spec.explicit_grants() {
        groups
            .entry(group)
            .or_default()
            .insert(target.clone(), permission);
    }
    groups
        .entry(ALL_USERS_GROUP)
        .or_default()
        .insert(target.clone(), spec.default_access());
    groups
}

/// Read the access to `target` back out of a graph.
///
/// Reserved groups are excluded from the grants; `none` entries are kept.
#[must_use]
pub fn extract(groups: &GroupPermissions, target: &CollectionId) -> CollectionAccess {
    let grants: BTreeMap<_, _> = groups
        .iter()
        .filter(|(group, _)| !group.is_reserved())
        .filter_map(|(group, collections)| {
            collections
                .get(target)
                .map(|permission| (*group, *permission))
        })
        .collect();

    let default_access = groups
        .get(&ALL_USERS_GROUP)
        .and_then(|collections| collections.get(target))
        .copied();

    CollectionAccess {
        grants,
        default_access,
    }
}

/// Build the graph to submit: `fetched` with the access to `target` replaced
/// by `spec`.
///
/// Non-reserved groups that had an entry for `target` and are absent from
/// `spec` are revoked to `none`. Other collections, and the administrators
/// group, are carried over unchanged. The revision is the fetched one.
#[must_use]
pub fn merge(fetched: &PermissionGraph, target: &CollectionId, spec: &AccessSpec) -> PermissionGraph {
    let desired = overlay(target, spec);
    let mut groups = fetched.groups.clone();

    for (group, collections) in &mut groups {
        if group.is_reserved() || desired.contains_key(group) {
            continue;
        }
        if let Some(permission) = collections.get_mut(target) {
            *permission = Permission::None;
        }
    }

    for (group, collections) in desired {
        groups.entry(group).or_default().extend(collections);
    }

    PermissionGraph {
        revision: fetched.revision,
        groups,
    }
}
