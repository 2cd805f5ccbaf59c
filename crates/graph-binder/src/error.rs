//! Error types for binding

use engine_client::EngineError;
use workflow_graph::{GraphError, PathError};

/// Why a bind failed
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Workflow template has no nodes")]
    EmptyTemplate,

    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(#[from] GraphError),

    /// A key path does not lead to a field of the template
    #[error(transparent)]
    Resolution(#[from] PathError),

    /// A mask arrived without a file input for its base field before it
    #[error("Cannot find the original parameter to map to the mask '{key_path}'")]
    MaskBaseMissing { key_path: String },

    #[error("Mask input '{key_path}' must be a file")]
    MaskNotAFile { key_path: String },

    /// The engine refused a file
    #[error("Failed to upload '{file_name}' for '{key_path}': {source}")]
    Upload {
        key_path: String,
        file_name: String,
        #[source]
        source: EngineError,
    },
}

impl BindError {
    /// Whether the engine could not be reached during an upload
    pub fn is_transport(&self) -> bool {
        matches!(self, BindError::Upload { source, .. } if source.is_transport())
    }
}
