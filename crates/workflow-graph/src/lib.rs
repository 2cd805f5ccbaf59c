//! Workflow graph model for ComfyUI-style generation engines
//!
//! An API-format workflow is a JSON object keyed by node id, where every node
//! carries a `class_type` and an `inputs` object. This crate provides:
//!
//! - `WorkflowGraph`: a validated, order-preserving working copy of a workflow
//! - `KeyPath`: `-`-delimited addresses such as `3-inputs-image`
//! - Template loading from `view_comfy.json` documents
//! - The binding conventions shared by the binder and the gateway
//!
//! # Example
//!
//! ```rust,ignore
//! use workflow_graph::{KeyPath, WorkflowGraph};
//!
//! let mut graph = WorkflowGraph::try_from(serde_json::json!({
//!     "3": { "class_type": "LoadImage", "inputs": { "image": "" } }
//! }))?;
//! graph.set(&KeyPath::parse("3-inputs-image")?, "cat.png".into())?;
//! ```

pub mod constants;
pub mod error;
pub mod graph;
pub mod path;
pub mod template;

pub use error::{GraphError, PathError};
pub use graph::{Node, NodeMut, WorkflowGraph};
pub use path::KeyPath;
pub use template::{load_view_comfy_template, template_from_document, TemplateError};
