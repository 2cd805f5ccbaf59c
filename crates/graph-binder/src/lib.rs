//! Workflow binding
//!
//! Turns a workflow template plus a batch of caller inputs into a graph ready
//! for submission:
//! - scalar inputs are written at their key path
//! - file inputs are uploaded and replaced by the engine-assigned name
//! - `-viewcomfymask` inputs run the clipspace mask protocol
//! - sink nodes get the run's filename prefix and sentinel seeds are rolled
//!
//! The template is never modified; each bind works on its own copy.

pub mod binder;
pub mod constants;
pub mod error;
pub mod input;
mod finish;
mod mask;

#[cfg(test)]
mod test_support;

pub use binder::{BoundWorkflow, GraphBinder};
pub use error::BindError;
pub use input::{FilePayload, InputDescriptor, InputValue, UploadRecord};
