//! Error types for engine operations

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::messages;

/// A failure the engine reported while validating or running a workflow.
///
/// `errors` carries per-node or per-exception detail that callers render
/// verbatim (missing custom nodes, out of memory, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct WorkflowError {
    pub message: String,
    pub errors: Vec<String>,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            message: message.into(),
            errors,
        }
    }

    /// Generic error used when the engine's own payload cannot be parsed
    pub fn fallback() -> Self {
        Self::new(
            messages::RUN_FAILED,
            vec![messages::RUN_FAILED_HINT.to_string()],
        )
    }

    /// The run finished without any artifact-sink output
    pub fn no_outputs() -> Self {
        Self::new(
            messages::NO_OUTPUTS,
            vec![messages::NO_OUTPUTS_HINT.to_string()],
        )
    }

    /// Parse a `/prompt` rejection body:
    /// `{ "error": { "message", "details", ... }, "node_errors": { id: { "class_type", "errors": [...] } } }`
    pub fn from_prompt_rejection(body: &Value) -> Option<Self> {
        let error = body.get("error")?;
        let message = match error {
            Value::String(message) => message.clone(),
            _ => error.get("message")?.as_str()?.to_string(),
        };

        let mut errors = Vec::new();
        if let Some(details) = non_empty_str(error.get("details")) {
            errors.push(details.to_string());
        }

        if let Some(node_errors) = body.get("node_errors").and_then(Value::as_object) {
            for (node_id, node_error) in node_errors {
                let class_type = node_error
                    .get("class_type")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown node");
                let entries = node_error
                    .get("errors")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten();
                for entry in entries {
                    let Some(entry_message) = non_empty_str(entry.get("message")) else {
                        continue;
                    };
                    let line = match non_empty_str(entry.get("details")) {
                        Some(details) => format!(
                            "{} (node {}): {}: {}",
                            class_type, node_id, entry_message, details
                        ),
                        None => format!("{} (node {}): {}", class_type, node_id, entry_message),
                    };
                    errors.push(line);
                }
            }
        }

        Some(Self::new(message, errors))
    }

    /// Parse the failure out of a finished history entry's `status.messages`
    pub fn from_history_status(status: &Value) -> Option<Self> {
        let messages = status.get("messages")?.as_array()?;
        for entry in messages {
            let Some([kind, data]) = entry.as_array().map(Vec::as_slice) else {
                continue;
            };
            match kind.as_str() {
                Some("execution_error") => {
                    let node_type = non_empty_str(data.get("node_type")).unwrap_or("Unknown node");
                    let node_id = data
                        .get("node_id")
                        .map(|id| match id {
                            Value::String(id) => id.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_default();
                    let exception_type =
                        non_empty_str(data.get("exception_type")).unwrap_or("Exception");
                    let mut errors = Vec::new();
                    if let Some(exception) = non_empty_str(data.get("exception_message")) {
                        errors.push(exception.trim().to_string());
                    }
                    return Some(Self::new(
                        format!(
                            "{} (node {}) failed with {}",
                            node_type, node_id, exception_type
                        ),
                        errors,
                    ));
                }
                Some("execution_interrupted") => {
                    return Some(Self::new(messages::INTERRUPTED, Vec::new()));
                }
                _ => {}
            }
        }
        None
    }
}

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be reached, or the connection broke
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An upload was refused
    #[error("Upload of '{file_name}' rejected ({status}): {message}")]
    UploadRejected {
        file_name: String,
        status: u16,
        message: String,
    },

    /// The engine rejected or failed the workflow
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// An artifact could not be fetched
    #[error("Artifact '{filename}' unavailable ({status})")]
    ArtifactUnavailable { filename: String, status: u16 },

    /// The engine answered with something this client does not understand
    #[error("Unexpected engine response: {0}")]
    Protocol(String),

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the failure is a connectivity problem rather than an engine verdict
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}
