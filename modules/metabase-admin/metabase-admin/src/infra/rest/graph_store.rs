use async_trait::async_trait;
use metabase_admin_sdk::PermissionGraph;
use metabase_http::{Transport, TransportError};
use tracing::debug;

use crate::domain::ports::GraphStore;

const GRAPH_PATH: &str = "collection/graph";

/// [`GraphStore`] backed by the collection graph endpoint.
pub struct RestGraphStore {
    transport: Transport,
}

impl RestGraphStore {
    /// `transport` must carry the session.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl GraphStore for RestGraphStore {
    async fn fetch(&self) -> Result<PermissionGraph, TransportError> {
        let graph: PermissionGraph = self.transport.get(GRAPH_PATH).await?;
        debug!(revision = graph.revision, groups = graph.groups.len(), "Fetched permission graph");
        Ok(graph)
    }

    async fn submit(&self, graph: &PermissionGraph) -> Result<PermissionGraph, TransportError> {
        debug!(revision = graph.revision, "Submitting permission graph");
        self.transport.put(GRAPH_PATH, graph).await
    }
}
