//! Workflow execution and artifact streaming

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use engine_client::{
    ArtifactDescriptor, ByteStream, EngineError, FetchedArtifact, SharedEngineClient,
    WorkflowError,
};
use futures_util::{stream, Stream, StreamExt};
use workflow_graph::WorkflowGraph;

use crate::error::GatewayError;
use crate::framing::{frame_header, resolve_content_type, SEPARATOR};
use crate::local::LocalOutputDir;
use crate::session::SessionGuard;

/// The framed multi-artifact byte stream
pub type FramedStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// A finished run: its artifacts and the stream that delivers them
pub struct Execution {
    /// Artifacts in engine order, available before the stream is polled
    pub artifacts: Vec<ArtifactDescriptor>,
    pub stream: FramedStream,
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

/// Runs bound graphs for a single request
pub struct ExecutionGateway {
    client: SharedEngineClient,
    local_outputs: Option<LocalOutputDir>,
}

impl ExecutionGateway {
    pub fn new(client: SharedEngineClient) -> Self {
        Self {
            client,
            local_outputs: None,
        }
    }

    /// Read `local` artifacts from this directory instead of over HTTP
    pub fn with_local_outputs(mut self, local_outputs: Option<LocalOutputDir>) -> Self {
        self.local_outputs = local_outputs;
        self
    }

    /// Submit `graph` and wait for it to run.
    ///
    /// On success the stream fetches artifacts lazily; the engine session is
    /// closed when it ends or is dropped. On failure the session is already
    /// closed.
    pub async fn execute(&self, graph: &WorkflowGraph) -> Result<Execution, GatewayError> {
        let session = SessionGuard::new(self.client.clone());

        let artifacts = match self.client.submit_graph(graph).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                session.close().await;
                return Err(e.into());
            }
        };

        if artifacts.is_empty() {
            log::warn!("Workflow finished without output files");
            session.close().await;
            return Err(GatewayError::NoArtifacts(WorkflowError::no_outputs()));
        }

        log::info!("Streaming {} artifact(s)", artifacts.len());
        let source = ArtifactSource {
            client: self.client.clone(),
            local_outputs: self.local_outputs.clone(),
        };
        let stream = framed_stream(artifacts.iter().cloned().collect(), source, session);

        Ok(Execution { artifacts, stream })
    }
}

/// Where artifact bytes come from
struct ArtifactSource {
    client: SharedEngineClient,
    local_outputs: Option<LocalOutputDir>,
}

impl ArtifactSource {
    async fn open(&self, artifact: &ArtifactDescriptor) -> Result<FetchedArtifact, EngineError> {
        match (&self.local_outputs, artifact.local) {
            (Some(dir), true) => dir.open(artifact).await,
            _ => self.client.fetch_artifact(artifact).await,
        }
    }
}

struct StreamState {
    pending: VecDeque<ArtifactDescriptor>,
    /// Body of the artifact being forwarded, at most one at a time
    current: Option<(String, ByteStream)>,
    source: ArtifactSource,
    session: SessionGuard,
}

fn framed_stream(
    pending: VecDeque<ArtifactDescriptor>,
    source: ArtifactSource,
    session: SessionGuard,
) -> FramedStream {
    let state = StreamState {
        pending,
        current: None,
        source,
        session,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        let chunk = next_chunk(&mut state).await?;
        Some((chunk, state))
    }))
}

async fn next_chunk(state: &mut StreamState) -> Option<Bytes> {
    loop {
        if let Some((filename, body)) = state.current.as_mut() {
            match body.next().await {
                Some(Ok(chunk)) => return Some(chunk),
                Some(Err(e)) => {
                    log::warn!("Artifact {} truncated: {}", filename, e);
                    state.current = None;
                    return Some(Bytes::from_static(SEPARATOR));
                }
                None => {
                    log::debug!("Streamed artifact {}", filename);
                    state.current = None;
                    return Some(Bytes::from_static(SEPARATOR));
                }
            }
        }

        let Some(artifact) = state.pending.pop_front() else {
            state.session.close().await;
            return None;
        };

        match state.source.open(&artifact).await {
            Ok(fetched) => {
                let content_type =
                    resolve_content_type(fetched.content_type.as_deref(), &artifact.filename);
                let header = frame_header(&content_type, &artifact.filename);
                state.current = Some((artifact.filename, fetched.body));
                return Some(header);
            }
            Err(e) => {
                log::warn!("Skipping artifact {}: {}", artifact.filename, e);
            }
        }
    }
}
