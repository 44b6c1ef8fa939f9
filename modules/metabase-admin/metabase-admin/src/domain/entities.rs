//! Users, permission groups, collections and memberships.
//!
//! Thin wrappers over the transport. List results of users, groups and
//! collections are cached until a mutation of the same type.

use metabase_admin_sdk::{
    Collection, CollectionId, CollectionInput, GroupId, MetabaseError, Membership, Memberships,
    NewMembership, PermissionGroup, PermissionGroupSummary, User, UserInput,
};
use metabase_http::Transport;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cache::ListCaches;

const USERS_PATH: &str = "user";
const GROUPS_PATH: &str = "permissions/group";
const COLLECTIONS_PATH: &str = "collection";
const MEMBERSHIPS_PATH: &str = "permissions/membership";

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    data: Vec<User>,
}

#[derive(Serialize)]
struct NewGroup<'a> {
    name: &'a str,
}

/// Entry of the member list returned when a membership is created.
#[derive(Deserialize)]
struct GroupMember {
    user_id: u64,
    membership_id: u64,
}

pub struct EntityService {
    transport: Transport,
    caches: ListCaches,
}

impl EntityService {
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            caches: ListCaches::default(),
        }
    }

    #[must_use]
    pub fn caches(&self) -> &ListCaches {
        &self.caches
    }

    // --- users -------------------------------------------------------------

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn list_users(&self) -> Result<Vec<User>, MetabaseError> {
        let users = self
            .caches
            .users
            .get_or_fetch(|| async move {
                let list: UserList = self.transport.get(USERS_PATH).await?;
                debug!(count = list.data.len(), "Fetched users");
                Ok::<_, MetabaseError>(list.data)
            })
            .await?;
        Ok(users)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn get_user(&self, id: u64) -> Result<User, MetabaseError> {
        Ok(self.transport.get(&format!("{USERS_PATH}/{id}")).await?)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn create_user(&self, user: &UserInput) -> Result<User, MetabaseError> {
        let created: User = self.transport.post(USERS_PATH, user).await?;
        self.caches.users.invalidate();
        info!(user_id = created.id, "Created user");
        Ok(created)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn update_user(&self, id: u64, user: &UserInput) -> Result<User, MetabaseError> {
        let updated: User = self
            .transport
            .put(&format!("{USERS_PATH}/{id}"), user)
            .await?;
        self.caches.users.invalidate();
        info!(user_id = id, "Updated user");
        Ok(updated)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn delete_user(&self, id: u64) -> Result<(), MetabaseError> {
        self.transport
            .delete::<IgnoredAny>(&format!("{USERS_PATH}/{id}"))
            .await?;
        self.caches.users.invalidate();
        info!(user_id = id, "Deactivated user");
        Ok(())
    }

    // --- permission groups -------------------------------------------------

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn list_groups(&self) -> Result<Vec<PermissionGroupSummary>, MetabaseError> {
        let groups = self
            .caches
            .groups
            .get_or_fetch(|| async move {
                let groups: Vec<PermissionGroupSummary> = self.transport.get(GROUPS_PATH).await?;
                Ok::<_, MetabaseError>(groups)
            })
            .await?;
        Ok(groups)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn get_group(&self, id: GroupId) -> Result<PermissionGroup, MetabaseError> {
        Ok(self.transport.get(&format!("{GROUPS_PATH}/{id}")).await?)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn create_group(&self, name: &str) -> Result<PermissionGroup, MetabaseError> {
        let created: PermissionGroup = self
            .transport
            .post(GROUPS_PATH, &NewGroup { name })
            .await?;
        self.caches.groups.invalidate();
        info!(group_id = %created.id, name, "Created permission group");
        Ok(created)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn delete_group(&self, id: GroupId) -> Result<(), MetabaseError> {
        self.transport
            .delete::<IgnoredAny>(&format!("{GROUPS_PATH}/{id}"))
            .await?;
        self.caches.groups.invalidate();
        info!(group_id = %id, "Deleted permission group");
        Ok(())
    }

    // --- collections -------------------------------------------------------

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn list_collections(&self) -> Result<Vec<Collection>, MetabaseError> {
        let collections = self
            .caches
            .collections
            .get_or_fetch(|| async move {
                let collections: Vec<Collection> = self.transport.get(COLLECTIONS_PATH).await?;
                Ok::<_, MetabaseError>(collections)
            })
            .await?;
        Ok(collections)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn get_collection(&self, id: &CollectionId) -> Result<Collection, MetabaseError> {
        Ok(self
            .transport
            .get(&format!("{COLLECTIONS_PATH}/{id}"))
            .await?)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn create_collection(
        &self,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError> {
        let created: Collection = self.transport.post(COLLECTIONS_PATH, collection).await?;
        self.caches.collections.invalidate();
        info!(collection = %created.graph_id(), "Created collection");
        Ok(created)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn update_collection(
        &self,
        id: &CollectionId,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError> {
        let updated: Collection = self
            .transport
            .put(&format!("{COLLECTIONS_PATH}/{id}"), collection)
            .await?;
        self.caches.collections.invalidate();
        info!(collection = %id, "Updated collection");
        Ok(updated)
    }

    // --- memberships -------------------------------------------------------

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn list_memberships(&self) -> Result<Memberships, MetabaseError> {
        Ok(self.transport.get(MEMBERSHIPS_PATH).await?)
    }

    /// # Errors
    ///
    /// - `Transport` on any request failure
    /// - `MembershipNotReturned` if the member list in the response lacks the user
    pub async fn create_membership(
        &self,
        membership: NewMembership,
    ) -> Result<Membership, MetabaseError> {
        let members: Vec<GroupMember> = self.transport.post(MEMBERSHIPS_PATH, &membership).await?;
        // member counts of the group list are now stale
        self.caches.groups.invalidate();

        let created = members
            .iter()
            .find(|member| member.user_id == membership.user_id)
            .map(|member| Membership {
                membership_id: member.membership_id,
                group_id: membership.group_id,
                user_id: member.user_id,
            })
            .ok_or(MetabaseError::MembershipNotReturned {
                user_id: membership.user_id,
                group_id: membership.group_id,
            })?;

        info!(
            membership_id = created.membership_id,
            user_id = created.user_id,
            group_id = %created.group_id,
            "Created membership"
        );
        Ok(created)
    }

    /// # Errors
    ///
    /// `Transport` on any request failure.
    pub async fn delete_membership(&self, membership_id: u64) -> Result<(), MetabaseError> {
        self.transport
            .delete::<IgnoredAny>(&format!("{MEMBERSHIPS_PATH}/{membership_id}"))
            .await?;
        self.caches.groups.invalidate();
        info!(membership_id, "Deleted membership");
        Ok(())
    }
}
