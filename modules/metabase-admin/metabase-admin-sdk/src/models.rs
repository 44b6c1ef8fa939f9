//! Domain models for the Metabase admin client.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Permission group identifier.
///
/// Serialized as a JSON object key (`"3"`) inside the permission graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// The built-in group every user belongs to.
pub const ALL_USERS_GROUP: GroupId = GroupId(1);

/// The built-in administrators group.
pub const ADMINISTRATORS_GROUP: GroupId = GroupId(2);

impl GroupId {
    /// Built-in groups are never controlled through explicit grants.
    #[must_use]
    pub fn is_reserved(self) -> bool {
        self == ALL_USERS_GROUP || self == ADMINISTRATORS_GROUP
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Collection identifier as used by the permission graph.
///
/// Usually numeric, but the graph also has non-numeric keys such as `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

impl CollectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for CollectionId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for CollectionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CollectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Permission graph
// ============================================================================

/// Access level of a group on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    None,
    Read,
    Write,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that is not `none`, `read` or `write`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}', expected one of: none, read, write")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            _ => Err(ParsePermissionError(s.to_owned())),
        }
    }
}

/// Permissions of one group, keyed by collection.
pub type CollectionPermissions = BTreeMap<CollectionId, Permission>;

/// The `groups` section of the permission graph.
pub type GroupPermissions = BTreeMap<GroupId, CollectionPermissions>;

/// The server-side collection permission graph.
///
/// A singleton document: every write replaces `groups` as a whole and is
/// accepted only if `revision` matches the server's current revision, which
/// then increases by one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGraph {
    pub revision: u64,
    #[serde(default)]
    pub groups: GroupPermissions,
}

impl PermissionGraph {
    /// Permission of `group` on `collection`, if the graph has an entry.
    #[must_use]
    pub fn permission(&self, group: GroupId, collection: &CollectionId) -> Option<Permission> {
        self.groups
            .get(&group)
            .and_then(|collections| collections.get(collection))
            .copied()
    }
}

/// Desired access to one collection.
///
/// Explicit grants for reserved groups are ignored when the spec is applied;
/// the all-users group is driven by `default_access` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSpec {
    grants: BTreeMap<GroupId, Permission>,
    default_access: Permission,
}

impl AccessSpec {
    #[must_use]
    pub fn new(default_access: Permission) -> Self {
        Self {
            grants: BTreeMap::new(),
            default_access,
        }
    }

    /// Builder-style grant; a later grant for the same group wins.
    #[must_use]
    pub fn grant(mut self, group: GroupId, permission: Permission) -> Self {
        self.grants.insert(group, permission);
        self
    }

    /// Build a spec from read and write group lists.
    ///
    /// A group present in both lists gets `write`.
    #[must_use]
    pub fn from_lists(
        read: impl IntoIterator<Item = GroupId>,
        write: impl IntoIterator<Item = GroupId>,
        default_access: Permission,
    ) -> Self {
        let mut spec = Self::new(default_access);
        for group in read {
            spec.grants.insert(group, Permission::Read);
        }
        for group in write {
            spec.grants.insert(group, Permission::Write);
        }
        spec
    }

    #[must_use]
    pub fn grants(&self) -> &BTreeMap<GroupId, Permission> {
        &self.grants
    }

    #[must_use]
    pub fn default_access(&self) -> Permission {
        self.default_access
    }

    /// Grants that are actually applied: reserved groups filtered out.
    pub fn explicit_grants(&self) -> impl Iterator<Item = (GroupId, Permission)> + '_ {
        self.grants
            .iter()
            .filter(|(group, _)| !group.is_reserved())
            .map(|(group, permission)| (*group, *permission))
    }
}

/// Access to one collection as read back from a permission graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionAccess {
    /// Non-reserved groups with an entry for the collection, `none` included.
    pub grants: BTreeMap<GroupId, Permission>,
    /// Entry of the all-users group, if present.
    pub default_access: Option<Permission>,
}

impl CollectionAccess {
    /// Groups holding exactly `permission`, in ascending numeric order.
    #[must_use]
    pub fn groups_with(&self, permission: Permission) -> Vec<GroupId> {
        self.grants
            .iter()
            .filter(|(_, p)| **p == permission)
            .map(|(group, _)| *group)
            .collect()
    }

    /// Turn the observed access back into a spec.
    ///
    /// `fallback_default` is used when the all-users group has no entry.
    #[must_use]
    pub fn to_spec(&self, fallback_default: Permission) -> AccessSpec {
        AccessSpec {
            grants: self.grants.clone(),
            default_access: self.default_access.unwrap_or(fallback_default),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// How a [`Session`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// A caller-supplied token passed the validity probe.
    Reused,
    /// The token came from a username/password exchange.
    FreshLogin,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reused => "reused",
            Self::FreshLogin => "fresh-login",
        })
    }
}

/// An established API session. Immutable; a new token means a new session.
///
/// The token is held as a [`SecretString`], so `Debug` output redacts it.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    mode: SessionMode,
    base_url: String,
    user_agent: String,
}

impl Session {
    #[must_use]
    pub fn new(
        token: SecretString,
        mode: SessionMode,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            token,
            mode,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Payload for creating or updating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInput {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    pub id: GroupId,
    pub name: String,
}

/// Entry of the permission group listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroupSummary {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionKey,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

/// Collection ids in entity payloads: numeric, or `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionKey {
    Id(u64),
    Named(String),
}

impl Collection {
    /// The key of this collection inside the permission graph.
    #[must_use]
    pub fn graph_id(&self) -> CollectionId {
        match &self.id {
            CollectionKey::Id(id) => CollectionId::from(*id),
            CollectionKey::Named(name) => CollectionId::from(name.as_str()),
        }
    }
}

/// Payload for creating or updating a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub membership_id: u64,
    pub group_id: GroupId,
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewMembership {
    pub user_id: u64,
    pub group_id: GroupId,
}

/// Membership listing, keyed by user id.
pub type Memberships = BTreeMap<u64, Vec<Membership>>;
