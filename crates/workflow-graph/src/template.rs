//! Template loading
//!
//! Templates are either a raw API-format graph or a `view_comfy.json`
//! document whose `workflows` entries carry the graph under
//! `workflowApiJSON`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tokio::fs;

use crate::constants::templates::WORKFLOW_API_KEY;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;

/// Errors raised while loading a workflow template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to launch ComfyUI: cannot read workflow template '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch ComfyUI: workflow template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to find workflowApiJSON in workflow template")]
    MissingWorkflowApi,

    #[error("Invalid workflow template: {0}")]
    Graph(#[from] GraphError),
}

/// Load a template from disk
pub async fn load_view_comfy_template(
    path: impl AsRef<Path>,
) -> Result<WorkflowGraph, TemplateError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| TemplateError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let document: Value = serde_json::from_str(&content)?;
    let graph = template_from_document(document)?;
    log::debug!(
        "Loaded workflow template '{}' with {} nodes",
        path.display(),
        graph.len()
    );
    Ok(graph)
}

/// Extract the workflow graph from a parsed template document
pub fn template_from_document(document: Value) -> Result<WorkflowGraph, TemplateError> {
    let Some(workflows) = document.get("workflows") else {
        return Ok(WorkflowGraph::try_from(document)?);
    };

    let graph = workflows
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|entry| entry.get(WORKFLOW_API_KEY))
        .cloned()
        .ok_or(TemplateError::MissingWorkflowApi)?;

    Ok(WorkflowGraph::try_from(graph)?)
}
