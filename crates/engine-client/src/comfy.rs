//! ComfyUI HTTP client
//!
//! Prompts are queued on `/prompt` and followed by polling `/history/{id}`
//! until the engine records a result. Uploads go through the multipart
//! `/upload/image` and `/upload/mask` endpoints, artifacts are streamed from
//! `/view`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use workflow_graph::WorkflowGraph;

use crate::client::EngineClient;
use crate::config::EngineConfig;
use crate::constants::endpoints;
use crate::error::{EngineError, WorkflowError};
use crate::outputs::collect_artifacts;
use crate::types::{
    ArtifactDescriptor, FetchedArtifact, UploadKind, UploadRequest, UploadResponse,
};

/// HTTP client for one run against a ComfyUI server
pub struct ComfyClient {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    /// Base URL of the engine, without trailing slash
    base_url: String,
    /// Identifies this run's prompts to the engine
    client_id: String,
    /// Interval between history polls
    poll_interval: Duration,
    /// Prompts queued by this client that have not finished yet
    pending_prompts: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ComfyClient {
    /// Create a client with a fresh client id
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing connection pool
    pub fn with_http_client(http_client: reqwest::Client, config: &EngineConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url(),
            client_id: uuid::Uuid::new_v4().to_string(),
            poll_interval: config.poll_interval(),
            pending_prompts: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Queue a graph, returning the engine's prompt id
    async fn queue_prompt(&self, graph: &WorkflowGraph) -> Result<String, EngineError> {
        let request = json!({
            "prompt": graph,
            "client_id": self.client_id,
        });

        let response = self
            .http_client
            .post(self.url(endpoints::PROMPT))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::warn!("Engine rejected prompt ({}): {}", status, body);
            let error = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|body| WorkflowError::from_prompt_rejection(&body))
                .unwrap_or_else(WorkflowError::fallback);
            return Err(EngineError::Workflow(error));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Protocol(format!("Invalid /prompt response: {}", e)))?;

        let prompt_id = body
            .get("prompt_id")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Protocol("Missing prompt_id in /prompt response".into()))?
            .to_string();

        self.pending_prompts.lock().push(prompt_id.clone());
        log::info!("Queued prompt {} for client {}", prompt_id, self.client_id);
        Ok(prompt_id)
    }

    /// Poll the history until the prompt has a recorded outcome
    async fn wait_for_history(&self, prompt_id: &str) -> Result<Value, EngineError> {
        let url = self.url(&format!("{}/{}", endpoints::HISTORY, prompt_id));
        loop {
            let response = self.http_client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(EngineError::Protocol(format!(
                    "History lookup for {} failed: {}",
                    prompt_id,
                    response.status()
                )));
            }

            let mut history: Value = response
                .json()
                .await
                .map_err(|e| EngineError::Protocol(format!("Invalid history response: {}", e)))?;

            if let Some(entry) = history.get_mut(prompt_id).map(Value::take) {
                return Ok(entry);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn finish_prompt(&self, prompt_id: &str) {
        self.pending_prompts.lock().retain(|id| id != prompt_id);
    }
}

#[async_trait]
impl EngineClient for ComfyClient {
    async fn upload_asset(&self, request: UploadRequest) -> Result<UploadResponse, EngineError> {
        let endpoint = match request.kind {
            UploadKind::Image => endpoints::UPLOAD_IMAGE,
            UploadKind::Mask => endpoints::UPLOAD_MASK,
        };

        let mut part = Part::bytes(request.bytes.to_vec()).file_name(request.file_name.clone());
        if let Some(content_type) = &request.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                EngineError::Protocol(format!("Invalid content type '{}': {}", content_type, e))
            })?;
        }

        let mut form = Form::new()
            .part("image", part)
            .text("type", "input")
            .text("overwrite", request.overwrite.to_string());
        if let Some(subfolder) = &request.subfolder {
            form = form.text("subfolder", subfolder.clone());
        }
        if let Some(original_ref) = &request.original_ref {
            let original_ref = serde_json::to_string(original_ref)
                .map_err(|e| EngineError::Protocol(format!("Invalid original_ref: {}", e)))?;
            form = form.text("original_ref", original_ref);
        }

        let response = self
            .http_client
            .post(self.url(endpoint))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::UploadRejected {
                file_name: request.file_name,
                status: status.as_u16(),
                message: upload_error_message(&body),
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Protocol(format!("Invalid upload response: {}", e)))?;

        log::debug!(
            "Uploaded {} to {} as '{}'",
            request.file_name,
            endpoint,
            uploaded.name
        );
        Ok(uploaded)
    }

    async fn submit_graph(
        &self,
        graph: &WorkflowGraph,
    ) -> Result<Vec<ArtifactDescriptor>, EngineError> {
        let prompt_id = self.queue_prompt(graph).await?;
        let entry = self.wait_for_history(&prompt_id).await?;
        self.finish_prompt(&prompt_id);

        let status = entry.get("status").cloned().unwrap_or(Value::Null);
        let failed = status.get("status_str").and_then(Value::as_str) == Some("error")
            || status.get("completed").and_then(Value::as_bool) == Some(false);
        if failed {
            let error =
                WorkflowError::from_history_status(&status).unwrap_or_else(WorkflowError::fallback);
            log::warn!("Prompt {} failed: {}", prompt_id, error);
            return Err(EngineError::Workflow(error));
        }

        let artifacts = collect_artifacts(entry.get("outputs").unwrap_or(&Value::Null));
        log::info!(
            "Prompt {} finished with {} artifact(s)",
            prompt_id,
            artifacts.len()
        );
        Ok(artifacts)
    }

    async fn fetch_artifact(
        &self,
        artifact: &ArtifactDescriptor,
    ) -> Result<FetchedArtifact, EngineError> {
        let response = self
            .http_client
            .get(self.url(endpoints::VIEW))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::ArtifactUnavailable {
                filename: artifact.filename.clone(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(EngineError::Transport));

        Ok(FetchedArtifact {
            content_type,
            body: Box::pin(body),
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let abandoned = std::mem::take(&mut *self.pending_prompts.lock());
        if !abandoned.is_empty() {
            log::info!(
                "Removing {} unfinished prompt(s) of client {} from the queue",
                abandoned.len(),
                self.client_id
            );
            let result = self
                .http_client
                .post(self.url(endpoints::QUEUE))
                .json(&json!({ "delete": abandoned }))
                .send()
                .await;
            if let Err(e) = result {
                log::warn!("Failed to clear unfinished prompts: {}", e);
            }
        }

        log::debug!("Closed engine client {}", self.client_id);
    }
}

/// The engine answers upload errors with either JSON or plain text
fn upload_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
