//! Client contract for ComfyUI-style generation engines
//!
//! The engine is reached through a narrow contract:
//! - **submit**: queue a workflow graph and wait for its artifacts
//! - **upload**: push input images and clipspace masks
//! - **fetch**: stream one produced artifact back
//! - **close**: release per-run session resources
//!
//! `EngineClient` is the trait seam; `ComfyClient` implements it over HTTP.
//!
//! # Example
//!
//! ```rust,ignore
//! use engine_client::{ComfyClient, EngineClient, EngineConfig};
//!
//! let client = ComfyClient::new(&EngineConfig::from_env());
//! let artifacts = client.submit_graph(&graph).await?;
//! client.close().await;
//! ```

pub mod client;
pub mod comfy;
pub mod config;
pub mod constants;
pub mod error;
pub mod outputs;
pub mod types;

pub use client::{EngineClient, SharedEngineClient};
pub use comfy::ComfyClient;
pub use config::EngineConfig;
pub use error::{EngineError, WorkflowError};
pub use types::{
    primary_output, ArtifactDescriptor, ArtifactKind, ByteStream, FetchedArtifact, FileRef,
    UploadKind, UploadRequest, UploadResponse,
};
