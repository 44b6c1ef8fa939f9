//! Public API traits of the Metabase admin client.
//!
//! The client implements every trait; consumers that only need one concern
//! can depend on the narrow trait object:
//!
//! ```ignore
//! let graph: Arc<dyn PermissionGraphClient> = Arc::new(client);
//! let access = graph.collection_access(&CollectionId::from(7)).await?;
//! ```

use async_trait::async_trait;

use crate::error::MetabaseError;
use crate::models::{
    AccessSpec, Collection, CollectionAccess, CollectionId, CollectionInput, GroupId, Membership,
    Memberships, NewMembership, PermissionGraph, PermissionGroup, PermissionGroupSummary, User,
    UserInput,
};

/// Read and update the collection permission graph.
#[async_trait]
pub trait PermissionGraphClient: Send + Sync {
    /// Fetch the current graph.
    ///
    /// # Errors
    ///
    /// `Sync(Fetch)` if the graph cannot be read.
    async fn permission_graph(&self) -> Result<PermissionGraph, MetabaseError>;

    /// Access to one collection as currently stored on the server.
    ///
    /// # Errors
    ///
    /// `Sync(Fetch)` if the graph cannot be read.
    async fn collection_access(
        &self,
        collection: &CollectionId,
    ) -> Result<CollectionAccess, MetabaseError>;

    /// Make `spec` the access of `collection`, retrying on revision conflicts.
    ///
    /// Groups that had an entry for the collection but are missing from
    /// `spec` are revoked (`none`). Entries for other collections are kept.
    ///
    /// # Errors
    ///
    /// `Sync(..)`; use [`crate::SyncError::failure_kind`] to tell contention
    /// from permanent failures.
    async fn update_collection_access(
        &self,
        collection: &CollectionId,
        spec: &AccessSpec,
    ) -> Result<PermissionGraph, MetabaseError>;
}

#[async_trait]
pub trait UsersClient: Send + Sync {
    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn list_users(&self) -> Result<Vec<User>, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn get_user(&self, id: u64) -> Result<User, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn create_user(&self, user: &UserInput) -> Result<User, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn update_user(&self, id: u64, user: &UserInput) -> Result<User, MetabaseError>;

    /// Deactivate a user.
    ///
    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn delete_user(&self, id: u64) -> Result<(), MetabaseError>;
}

#[async_trait]
pub trait PermissionGroupsClient: Send + Sync {
    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn list_groups(&self) -> Result<Vec<PermissionGroupSummary>, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn get_group(&self, id: GroupId) -> Result<PermissionGroup, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn create_group(&self, name: &str) -> Result<PermissionGroup, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn delete_group(&self, id: GroupId) -> Result<(), MetabaseError>;
}

#[async_trait]
pub trait CollectionsClient: Send + Sync {
    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn list_collections(&self) -> Result<Vec<Collection>, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn get_collection(&self, id: &CollectionId) -> Result<Collection, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn create_collection(
        &self,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn update_collection(
        &self,
        id: &CollectionId,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError>;
}

#[async_trait]
pub trait MembershipsClient: Send + Sync {
    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn list_memberships(&self) -> Result<Memberships, MetabaseError>;

    /// Add a user to a group.
    ///
    /// # Errors
    ///
    /// - `Transport` on any request failure
    /// - `MembershipNotReturned` if the response does not list the user
    async fn create_membership(
        &self,
        membership: NewMembership,
    ) -> Result<Membership, MetabaseError>;

    /// # Errors
    ///
    /// `Transport` on any request failure.
    async fn delete_membership(&self, membership_id: u64) -> Result<(), MetabaseError>;
}
