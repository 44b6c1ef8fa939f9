use async_trait::async_trait;
use metabase_admin_sdk::{
    AccessSpec, Collection, CollectionAccess, CollectionId, CollectionInput, CollectionsClient,
    GroupId, Membership, Memberships, MembershipsClient, MetabaseError, NewMembership,
    PermissionGraph, PermissionGraphClient, PermissionGroup, PermissionGroupSummary,
    PermissionGroupsClient, Session, User, UserInput, UsersClient,
};
use metabase_http::Transport;
use tokio_util::sync::CancellationToken;

use crate::config::MetabaseConfig;
use crate::domain::entities::EntityService;
use crate::domain::session::{Credentials, SessionManager};
use crate::domain::sync::{GraphSynchronizer, RetryPolicy};
use crate::infra::rest::RestGraphStore;

/// Admin client bound to one established session.
///
/// Implements every SDK client trait. Graph updates issued through one
/// client are serialized; list results are cached per resource type.
pub struct MetabaseClient {
    session: Session,
    synchronizer: GraphSynchronizer<RestGraphStore>,
    entities: EntityService,
}

impl MetabaseClient {
    /// Establish a session (reusing `session_id` when still valid) and build
    /// the client.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` does not validate
    /// - `Transport` if the host is not a usable URL
    /// - `Auth` if no session can be established
    pub async fn connect(config: &MetabaseConfig) -> Result<Self, MetabaseError> {
        config
            .validate()
            .map_err(|e| MetabaseError::config(e.to_string()))?;

        let transport = Transport::new(&config.host, &config.transport())?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let session = SessionManager::new(transport.clone())
            .authenticate(&credentials, config.session_id.as_ref())
            .await?;

        Ok(Self::with_session(&transport, session, config.retry_policy()))
    }

    /// Build a client around an already established session.
    #[must_use]
    pub fn with_session(transport: &Transport, session: Session, policy: RetryPolicy) -> Self {
        let transport = transport.with_session(session.token().clone());
        Self {
            session,
            synchronizer: GraphSynchronizer::new(RestGraphStore::new(transport.clone()), policy),
            entities: EntityService::new(transport),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Like [`PermissionGraphClient::update_collection_access`], but gives up
    /// with `Sync(Cancelled)` once `cancel` fires.
    ///
    /// # Errors
    ///
    /// `Sync(..)`.
    pub async fn update_collection_access_cancellable(
        &self,
        collection: &CollectionId,
        spec: &AccessSpec,
        cancel: &CancellationToken,
    ) -> Result<PermissionGraph, MetabaseError> {
        Ok(self
            .synchronizer
            .update_graph_cancellable(collection, spec, cancel)
            .await?)
    }

    /// Drop every cached list.
    pub fn invalidate_caches(&self) {
        self.entities.caches().invalidate_all();
    }
}

#[async_trait]
impl PermissionGraphClient for MetabaseClient {
    async fn permission_graph(&self) -> Result<PermissionGraph, MetabaseError> {
        Ok(self.synchronizer.current_graph().await?)
    }

    async fn collection_access(
        &self,
        collection: &CollectionId,
    ) -> Result<CollectionAccess, MetabaseError> {
        Ok(self.synchronizer.collection_access(collection).await?)
    }

    async fn update_collection_access(
        &self,
        collection: &CollectionId,
        spec: &AccessSpec,
    ) -> Result<PermissionGraph, MetabaseError> {
        Ok(self.synchronizer.update_graph(collection, spec).await?)
    }
}

#[async_trait]
impl UsersClient for MetabaseClient {
    async fn list_users(&self) -> Result<Vec<User>, MetabaseError> {
        self.entities.list_users().await
    }

    async fn get_user(&self, id: u64) -> Result<User, MetabaseError> {
        self.entities.get_user(id).await
    }

    async fn create_user(&self, user: &UserInput) -> Result<User, MetabaseError> {
        self.entities.create_user(user).await
    }

    async fn update_user(&self, id: u64, user: &UserInput) -> Result<User, MetabaseError> {
        self.entities.update_user(id, user).await
    }

    async fn delete_user(&self, id: u64) -> Result<(), MetabaseError> {
        self.entities.delete_user(id).await
    }
}

#[async_trait]
impl PermissionGroupsClient for MetabaseClient {
    async fn list_groups(&self) -> Result<Vec<PermissionGroupSummary>, MetabaseError> {
        self.entities.list_groups().await
    }

    async fn get_group(&self, id: GroupId) -> Result<PermissionGroup, MetabaseError> {
        self.entities.get_group(id).await
    }

    async fn create_group(&self, name: &str) -> Result<PermissionGroup, MetabaseError> {
        self.entities.create_group(name).await
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), MetabaseError> {
        self.entities.delete_group(id).await
    }
}

#[async_trait]
impl CollectionsClient for MetabaseClient {
    async fn list_collections(&self) -> Result<Vec<Collection>, MetabaseError> {
        self.entities.list_collections().await
    }

    async fn get_collection(&self, id: &CollectionId) -> Result<Collection, MetabaseError> {
        self.entities.get_collection(id).await
    }

    async fn create_collection(
        &self,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError> {
        self.entities.create_collection(collection).await
    }

    async fn update_collection(
        &self,
        id: &CollectionId,
        collection: &CollectionInput,
    ) -> Result<Collection, MetabaseError> {
        self.entities.update_collection(id, collection).await
    }
}

#[async_trait]
impl MembershipsClient for MetabaseClient {
    async fn list_memberships(&self) -> Result<Memberships, MetabaseError> {
        self.entities.list_memberships().await
    }

    async fn create_membership(
        &self,
        membership: NewMembership,
    ) -> Result<Membership, MetabaseError> {
        self.entities.create_membership(membership).await
    }

    async fn delete_membership(&self, membership_id: u64) -> Result<(), MetabaseError> {
        self.entities.delete_membership(membership_id).await
    }
}
