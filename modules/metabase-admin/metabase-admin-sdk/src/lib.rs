//! Metabase Admin SDK
//!
//! This crate provides the public contract of the Metabase admin client:
//!
//! - [`PermissionGraphClient`] - read and update collection permissions
//! - [`UsersClient`], [`PermissionGroupsClient`], [`CollectionsClient`],
//!   [`MembershipsClient`] - entity CRUD
//! - [`PermissionGraph`], [`AccessSpec`], [`CollectionAccess`] - graph models
//! - [`Session`] - an established API session
//! - [`AuthError`], [`SyncError`], [`MetabaseError`] - error types
//!
//! ## Usage
//!
//! ```ignore
//! use metabase_admin_sdk::{AccessSpec, CollectionId, GroupId, Permission, PermissionGraphClient};
//!
//! let spec = AccessSpec::new(Permission::None).grant(GroupId(3), Permission::Write);
//! let graph = client
//!     .update_collection_access(&CollectionId::from(7), &spec)
//!     .await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::{
    CollectionsClient, MembershipsClient, PermissionGraphClient, PermissionGroupsClient,
    UsersClient,
};
pub use error::{AuthError, FailureKind, MetabaseError, SyncError};
pub use models::{
    ADMINISTRATORS_GROUP, ALL_USERS_GROUP, AccessSpec, Collection, CollectionAccess, CollectionId,
    CollectionInput, CollectionKey, CollectionPermissions, GroupId, GroupPermissions, Membership,
    Memberships, NewMembership, ParsePermissionError, Permission, PermissionGraph,
    PermissionGroup, PermissionGroupSummary, Session, SessionMode, User, UserInput,
};
