//! Scripted engine for gateway tests

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use engine_client::{
    ArtifactDescriptor, EngineClient, EngineError, FetchedArtifact, UploadRequest, UploadResponse,
    WorkflowError,
};
use futures_util::stream;
use parking_lot::Mutex;
use workflow_graph::WorkflowGraph;

/// What the engine serves for one artifact
pub(crate) enum Served {
    Chunks(Option<&'static str>, Vec<&'static [u8]>),
    /// Some chunks, then a broken connection
    Broken(Vec<&'static [u8]>),
    Missing,
}

pub(crate) struct ScriptedEngine {
    pub submit_result: Mutex<Option<Result<Vec<ArtifactDescriptor>, EngineError>>>,
    pub served: Mutex<Vec<(String, Served)>>,
    pub fetched: Mutex<Vec<String>>,
    pub close_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn producing(artifacts: Vec<(ArtifactDescriptor, Served)>) -> Self {
        let descriptors = artifacts.iter().map(|(a, _)| a.clone()).collect();
        let served = artifacts
            .into_iter()
            .map(|(a, served)| (a.filename, served))
            .collect();
        Self {
            submit_result: Mutex::new(Some(Ok(descriptors))),
            served: Mutex::new(served),
            fetched: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: EngineError) -> Self {
        let engine = Self::producing(Vec::new());
        *engine.submit_result.lock() = Some(Err(error));
        engine
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn upload_asset(&self, request: UploadRequest) -> Result<UploadResponse, EngineError> {
        Ok(UploadResponse {
            name: request.file_name,
            subfolder: String::new(),
            kind: None,
        })
    }

    async fn submit_graph(
        &self,
        _graph: &WorkflowGraph,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError> {
        self.submit_result
            .lock()
            .take()
            .unwrap_or_else(|| Err(EngineError::Workflow(WorkflowError::fallback())))
    }

    async fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
    ) -> Result<FetchedArtifact, EngineError> {
        self.fetched.lock().push(artifact.filename.clone());
        let mut served = self.served.lock();
        let position = served
            .iter()
            .position(|(name, _)| name == &artifact.filename);
        let missing = EngineError::ArtifactUnavailable {
            filename: artifact.filename.clone(),
            status: 404,
        };
        let Some(position) = position else {
            return Err(missing);
        };
        match served.remove(position).1 {
            Served::Chunks(content_type, chunks) => {
                let chunks: Vec<Result<Bytes, EngineError>> = chunks
                    .into_iter()
                    .map(|chunk| Ok(Bytes::from_static(chunk)))
                    .collect();
                Ok(FetchedArtifact {
                    content_type: content_type.map(str::to_string),
                    body: Box::pin(stream::iter(chunks)),
                })
            }
            Served::Broken(chunks) => {
                let mut items: Vec<Result<Bytes, EngineError>> = chunks
                    .into_iter()
                    .map(|chunk| Ok(Bytes::from_static(chunk)))
                    .collect();
                items.push(Err(EngineError::Protocol("connection reset".into())));
                Ok(FetchedArtifact {
                    content_type: None,
                    body: Box::pin(stream::iter(items)),
                })
            }
            Served::Missing => Err(missing),
        }
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}
