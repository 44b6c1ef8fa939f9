use async_trait::async_trait;
use metabase_admin_sdk::PermissionGraph;
use metabase_http::TransportError;

/// Storage of the permission graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Read the current graph, revision included.
    ///
    /// # Errors
    ///
    /// Any transport failure.
    async fn fetch(&self) -> Result<PermissionGraph, TransportError>;

    /// Replace the graph. Returns the graph as stored by the server.
    ///
    /// # Errors
    ///
    /// `Api` when the server refuses the write, revision conflicts included;
    /// any other transport failure otherwise.
    async fn submit(&self, graph: &PermissionGraph) -> Result<PermissionGraph, TransportError>;
}
