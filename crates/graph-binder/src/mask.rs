//! Clipspace mask protocol
//!
//! A masked image input is delivered to the engine in three uploads, in this
//! order:
//! 1. the mask, as `clipspace-mask-<run>.png`, over the base image
//! 2. the base image bytes, as `clipspace-painted-<run>.png`, over the base image
//! 3. the mask again, as `clipspace-painted-masked-<run>.png`, over step 2
//!
//! The bound field then points at `clipspace/<step 3 name> [input]`.

use engine_client::{EngineClient, FileRef, UploadRequest};
use serde_json::Value;
use workflow_graph::{KeyPath, WorkflowGraph};

use crate::constants::clipspace;
use crate::error::BindError;
use crate::input::FilePayload;

/// File name of one protocol stage for a run
pub(crate) fn clipspace_file_name(stage: &str, run_id: &str) -> String {
    format!("clipspace-{}-{}.png", stage, run_id)
}

/// Value bound into the field once the protocol completes
pub(crate) fn clipspace_reference(file_name: &str) -> String {
    format!(
        "{}/{} {}",
        clipspace::SUBFOLDER,
        file_name,
        clipspace::INPUT_ANNOTATION
    )
}

pub(crate) struct MaskUpload<'a> {
    /// The mask input's own key path, for error reporting
    pub mask_path: &'a KeyPath,
    /// The field the mask applies to
    pub field: &'a KeyPath,
    pub base: &'a FilePayload,
    pub mask: &'a FilePayload,
}

/// Run the three uploads and bind the field to the final masked image
pub(crate) async fn apply_mask(
    client: &dyn EngineClient,
    run_id: &str,
    graph: &mut WorkflowGraph,
    upload: MaskUpload<'_>,
) -> Result<(), BindError> {
    let base_name = graph
        .get(upload.field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BindError::MaskBaseMissing {
            key_path: upload.mask_path.to_string(),
        })?;
    let base_ref = FileRef::input(base_name);

    let mask_name = clipspace_file_name(clipspace::MASK_STAGE, run_id);
    let request = UploadRequest::mask(&mask_name, upload.mask.bytes.clone(), base_ref.clone())
        .with_subfolder(clipspace::SUBFOLDER)
        .with_content_type(upload.mask.resolved_content_type());
    send(client, upload.mask_path, request).await?;

    let painted_name = clipspace_file_name(clipspace::PAINTED_STAGE, run_id);
    let request = UploadRequest::image(&painted_name, upload.base.bytes.clone())
        .with_subfolder(clipspace::SUBFOLDER)
        .with_original_ref(base_ref)
        .with_content_type(upload.base.resolved_content_type());
    let painted = send(client, upload.mask_path, request).await?;

    let painted_ref = FileRef {
        subfolder: clipspace::SUBFOLDER.to_string(),
        ..FileRef::input(painted)
    };
    let masked_name = clipspace_file_name(clipspace::PAINTED_MASKED_STAGE, run_id);
    let request = UploadRequest::mask(&masked_name, upload.mask.bytes.clone(), painted_ref)
        .with_subfolder(clipspace::SUBFOLDER)
        .with_content_type(upload.mask.resolved_content_type());
    let masked = send(client, upload.mask_path, request).await?;

    graph.set(upload.field, Value::String(clipspace_reference(&masked)))?;
    log::info!("Bound mask for {} as {}", upload.field, masked);
    Ok(())
}

async fn send(
    client: &dyn EngineClient,
    mask_path: &KeyPath,
    request: UploadRequest,
) -> Result<String, BindError> {
    let file_name = request.file_name.clone();
    let response = client
        .upload_asset(request)
        .await
        .map_err(|source| BindError::Upload {
            key_path: mask_path.to_string(),
            file_name: file_name.clone(),
            source,
        })?;
    log::debug!("Mask stage {} stored as {}", file_name, response.name);
    Ok(response.name)
}
