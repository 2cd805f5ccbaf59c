//! Gateway failures

use engine_client::{EngineError, WorkflowError};

/// Coarse failure class, for mapping onto transport status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The workflow cannot produce artifacts as configured
    Configuration,
    /// The engine rejected or failed the workflow
    Execution,
    /// The engine could not be reached
    Transport,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The run finished without any artifact
    #[error("{0}")]
    NoArtifacts(WorkflowError),

    #[error("{0}")]
    Execution(WorkflowError),

    #[error("Engine unreachable: {0}")]
    Transport(#[source] EngineError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoArtifacts(_) => ErrorKind::Configuration,
            GatewayError::Execution(_) => ErrorKind::Execution,
            GatewayError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Message and sub-errors to show the caller, when the engine gave any
    pub fn workflow_error(&self) -> Option<&WorkflowError> {
        match self {
            GatewayError::NoArtifacts(error) | GatewayError::Execution(error) => Some(error),
            GatewayError::Transport(_) => None,
        }
    }
}

impl From<EngineError> for GatewayError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Workflow(error) => GatewayError::Execution(error),
            error if error.is_transport() => GatewayError::Transport(error),
            error => {
                log::error!("Workflow run failed: {}", error);
                GatewayError::Execution(WorkflowError::fallback())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_kinds() {
        let rejected = WorkflowError::new("Prompt outputs failed validation", vec!["x".into()]);
        let error = GatewayError::from(EngineError::Workflow(rejected.clone()));
        assert_eq!(error.kind(), ErrorKind::Execution);
        assert_eq!(error.workflow_error(), Some(&rejected));

        let error = GatewayError::from(EngineError::Protocol("garbage".into()));
        assert_eq!(error.kind(), ErrorKind::Execution);
        assert_eq!(error.workflow_error(), Some(&WorkflowError::fallback()));

        let error = GatewayError::NoArtifacts(WorkflowError::no_outputs());
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(error.to_string(), "No output files found");
    }
}
