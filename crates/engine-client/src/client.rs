//! The engine contract

use std::sync::Arc;

use async_trait::async_trait;
use workflow_graph::WorkflowGraph;

use crate::error::EngineError;
use crate::types::{ArtifactDescriptor, FetchedArtifact, UploadRequest, UploadResponse};

/// Shared handle to an engine client, injected into binders and gateways
pub type SharedEngineClient = Arc<dyn EngineClient>;

/// Everything the binder and the gateway need from a generation engine.
///
/// One client serves one request. Implementations may hold per-run session
/// state (a client id, queued prompts) that `close` releases.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Push an input image or mask; the engine may rename it on collision
    async fn upload_asset(&self, request: UploadRequest) -> Result<UploadResponse, EngineError>;

    /// Queue a graph and wait until it has run, returning the artifacts it produced
    async fn submit_graph(
        &self,
        graph: &WorkflowGraph,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError>;

    /// Open a byte stream for one artifact
    async fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
    ) -> Result<FetchedArtifact, EngineError>;

    /// Release per-run session resources
    async fn close(&self);
}
