//! Error types for workflow graphs and key paths

use thiserror::Error;

/// Errors raised while resolving a key path against a graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The key path does not have the `<nodeId>-...-<field>` shape
    #[error("Invalid key path '{0}': expected at least '<nodeId>-<field>' with no empty segments")]
    Malformed(String),

    /// A segment does not exist in the graph
    #[error("Key path '{path}' does not resolve: segment '{segment}' not found")]
    Unresolved { path: String, segment: String },

    /// A segment resolved to a scalar where an object was required
    #[error("Key path '{path}' does not resolve: '{segment}' is not an object")]
    NotAContainer { path: String, segment: String },
}

/// Errors that make a document unusable as a workflow graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The root is not a JSON object
    #[error("Workflow graph must be a JSON object keyed by node id")]
    NotAnObject,

    /// A node is missing its class type or has malformed inputs
    #[error("Node '{0}' must be an object with a string class_type and an inputs object")]
    InvalidNode(String),

    /// A link points at a node id that is not in the graph
    #[error("Node '{node}' input '{input}' links to missing node '{target}'")]
    DanglingLink {
        node: String,
        input: String,
        target: String,
    },
}
