//! In-memory engine that records uploads

use async_trait::async_trait;
use engine_client::{
    ArtifactDescriptor, EngineClient, EngineError, FetchedArtifact, UploadKind, UploadRequest,
    UploadResponse,
};
use parking_lot::Mutex;
use workflow_graph::WorkflowGraph;

#[derive(Default)]
pub(crate) struct RecordingClient {
    pub uploads: Mutex<Vec<UploadRequest>>,
    /// Prefix the engine adds to image names, simulating a rename
    pub rename_prefix: Option<&'static str>,
    /// Reject uploads whose name contains this text
    pub reject_containing: Option<&'static str>,
}

impl RecordingClient {
    pub fn renaming(prefix: &'static str) -> Self {
        Self {
            rename_prefix: Some(prefix),
            ..Default::default()
        }
    }

    pub fn rejecting(fragment: &'static str) -> Self {
        Self {
            reject_containing: Some(fragment),
            ..Default::default()
        }
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .iter()
            .map(|request| request.file_name.clone())
            .collect()
    }
}

#[async_trait]
impl EngineClient for RecordingClient {
    async fn upload_asset(&self, request: UploadRequest) -> Result<UploadResponse, EngineError> {
        if let Some(fragment) = self.reject_containing {
            if request.file_name.contains(fragment) {
                return Err(EngineError::UploadRejected {
                    file_name: request.file_name,
                    status: 400,
                    message: "rejected".to_string(),
                });
            }
        }

        let name = match (request.kind, self.rename_prefix) {
            (UploadKind::Image, Some(prefix)) => format!("{}{}", prefix, request.file_name),
            _ => request.file_name.clone(),
        };
        let response = UploadResponse {
            name,
            subfolder: request.subfolder.clone().unwrap_or_default(),
            kind: Some("input".to_string()),
        };
        self.uploads.lock().push(request);
        Ok(response)
    }

    async fn submit_graph(
        &self,
        _graph: &WorkflowGraph,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError> {
        Ok(Vec::new())
    }

    async fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
    ) -> Result<FetchedArtifact, EngineError> {
        Err(EngineError::ArtifactUnavailable {
            filename: artifact.filename.clone(),
            status: 404,
        })
    }

    async fn close(&self) {}
}
