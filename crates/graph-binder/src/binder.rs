//! The graph binder

use engine_client::{SharedEngineClient, UploadRequest};
use serde_json::Value;
use uuid::Uuid;
use workflow_graph::{KeyPath, WorkflowGraph};

use crate::constants::uploads;
use crate::error::BindError;
use crate::finish::finish_graph;
use crate::input::{FilePayload, InputDescriptor, InputValue, UploadRecord};
use crate::mask::{apply_mask, MaskUpload};

/// A graph ready for submission, plus what was uploaded to produce it
#[derive(Debug, Clone, PartialEq)]
pub struct BoundWorkflow {
    pub graph: WorkflowGraph,
    pub uploads: Vec<UploadRecord>,
}

/// One validated input
enum Binding<'a> {
    Scalar {
        path: KeyPath,
        value: &'a Value,
    },
    File {
        path: KeyPath,
        file: &'a FilePayload,
    },
    Mask {
        path: KeyPath,
        field: KeyPath,
        base: &'a FilePayload,
        mask: &'a FilePayload,
    },
}

/// Binds inputs into templates for a single run.
///
/// Every graph bound by one binder shares its run identity: the sink filename
/// prefix and the mask-protocol file names derive from it. Create one binder
/// per request.
pub struct GraphBinder {
    client: SharedEngineClient,
    run_id: Uuid,
}

impl GraphBinder {
    pub fn new(client: SharedEngineClient) -> Self {
        Self::with_run_id(client, Uuid::new_v4())
    }

    pub fn with_run_id(client: SharedEngineClient, run_id: Uuid) -> Self {
        Self { client, run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Prefix stamped on every sink node, `<run>_`
    pub fn filename_prefix(&self) -> String {
        format!("{}_", self.run_id)
    }

    /// Bind `inputs` into a copy of `template`.
    ///
    /// Inputs are applied in order, so a later input for the same key path
    /// wins and may write inside a value an earlier input set. Every key path
    /// is checked against that cumulative graph before the first upload is
    /// sent.
    pub async fn bind(
        &self,
        template: &WorkflowGraph,
        inputs: &[InputDescriptor],
    ) -> Result<BoundWorkflow, BindError> {
        if template.is_empty() {
            return Err(BindError::EmptyTemplate);
        }
        template.validate_links()?;

        let bindings = plan(template, inputs)?;
        log::info!(
            "Binding {} input(s) for run {}",
            bindings.len(),
            self.run_id
        );

        let run_id = self.run_id.to_string();
        let mut graph = template.clone();
        let mut upload_records = Vec::new();

        for binding in bindings {
            match binding {
                Binding::Scalar { path, value } => {
                    log::debug!("Setting {} = {}", path, value);
                    graph.set(&path, value.clone())?;
                }
                Binding::File { path, file } => {
                    let record = self.upload_file(&path, file).await?;
                    graph.set(&path, Value::String(record.engine_assigned_name.clone()))?;
                    upload_records.push(record);
                }
                Binding::Mask {
                    path,
                    field,
                    base,
                    mask,
                } => {
                    let upload = MaskUpload {
                        mask_path: &path,
                        field: &field,
                        base,
                        mask,
                    };
                    apply_mask(self.client.as_ref(), &run_id, &mut graph, upload).await?;
                }
            }
        }

        finish_graph(&mut graph, &self.filename_prefix());

        Ok(BoundWorkflow {
            graph,
            uploads: upload_records,
        })
    }

    async fn upload_file(
        &self,
        path: &KeyPath,
        file: &FilePayload,
    ) -> Result<UploadRecord, BindError> {
        let file_name = self.unique_upload_name(&file.name);
        let request = UploadRequest::image(&file_name, file.bytes.clone())
            .with_content_type(file.resolved_content_type());

        let response = self
            .client
            .upload_asset(request)
            .await
            .map_err(|source| BindError::Upload {
                key_path: path.to_string(),
                file_name,
                source,
            })?;

        log::info!(
            "Uploaded {} for {} as {}",
            file.name,
            path,
            response.name
        );
        Ok(UploadRecord {
            key_path: path.to_string(),
            original_name: file.name.clone(),
            engine_assigned_name: response.name,
        })
    }

    /// `<run>_<8 hex>_<original>`, unique even for repeated names
    fn unique_upload_name(&self, original: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = suffix.get(..uploads::UNIQUE_SUFFIX_LEN).unwrap_or(suffix.as_str());
        format!("{}{}_{}", self.filename_prefix(), suffix, original)
    }
}

/// Validate every input and resolve mask pairings.
///
/// Inputs are applied in order to a scratch copy of the template, files and
/// masks as their original names, so each key path resolves against the graph
/// the earlier inputs leave behind.
fn plan<'a>(
    template: &WorkflowGraph,
    inputs: &'a [InputDescriptor],
) -> Result<Vec<Binding<'a>>, BindError> {
    let mut scratch = template.clone();
    let mut bindings: Vec<Binding<'a>> = Vec::with_capacity(inputs.len());

    for input in inputs {
        let Some(value) = &input.value else {
            log::debug!("Skipping empty input {}", input.key_path);
            continue;
        };
        let path = KeyPath::parse(&input.key_path)?;

        if path.is_mask() {
            let Some(mask) = value.as_file() else {
                return Err(BindError::MaskNotAFile {
                    key_path: input.key_path.clone(),
                });
            };
            let missing_base = || BindError::MaskBaseMissing {
                key_path: input.key_path.clone(),
            };
            let field = path.unmasked().ok_or_else(missing_base)?;
            scratch.set(&field, Value::String(mask.name.clone()))?;
            let base = latest_file_for(&bindings, &field).ok_or_else(missing_base)?;
            bindings.push(Binding::Mask {
                path,
                field,
                base,
                mask,
            });
            continue;
        }

        bindings.push(match value {
            InputValue::Scalar(value) => {
                scratch.set(&path, value.clone())?;
                Binding::Scalar { path, value }
            }
            InputValue::File(file) => {
                scratch.set(&path, Value::String(file.name.clone()))?;
                Binding::File { path, file }
            }
        });
    }

    Ok(bindings)
}

/// The file most recently bound at `field`, unless a scalar replaced it
fn latest_file_for<'a>(bindings: &[Binding<'a>], field: &KeyPath) -> Option<&'a FilePayload> {
    bindings.iter().rev().find_map(|binding| match binding {
        Binding::File { path, file } if path == field => Some(Some(*file)),
        Binding::Scalar { path, .. } if path == field => Some(None),
        Binding::Mask {
            field: masked, base, ..
        } if masked == field => Some(Some(*base)),
        _ => None,
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use engine_client::{EngineError, UploadKind};
    use serde_json::json;
    use workflow_graph::constants::{is_seed_sentinel, nodes};

    use crate::test_support::RecordingClient;

    fn template() -> WorkflowGraph {
        WorkflowGraph::try_from(json!({
            "3": {
                "class_type": "LoadImage",
                "inputs": { "image": "example.png", "upload": "image" },
                "_meta": { "title": "Load Image" }
            },
            "5": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": 5e-324,
                    "steps": 20,
                    "cfg": 7.5,
                    "model": ["4", 0],
                    "positive": ["6", 0]
                }
            },
            "4": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "sd.safetensors" } },
            "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "a cat", "clip": ["4", 1] } },
            "9": {
                "class_type": "SaveImage",
                "inputs": { "filename_prefix": "ComfyUI", "images": ["3", 0] }
            }
        }))
        .unwrap()
    }

    fn binder(client: &Arc<RecordingClient>) -> GraphBinder {
        GraphBinder::new(client.clone())
    }

    fn png(name: &str) -> FilePayload {
        FilePayload::new(name, Bytes::from_static(b"\x89PNG base"))
    }

    fn mask_png() -> FilePayload {
        FilePayload::new("mask.png", Bytes::from_static(b"\x89PNG mask"))
    }

    /// Strip fields that depend on the run so two binds can be compared
    fn without_run_fields(mut graph: WorkflowGraph) -> Value {
        for mut node in graph.nodes_mut() {
            if let Some(inputs) = node.inputs_mut() {
                inputs.remove(nodes::FILENAME_PREFIX_INPUT);
                inputs.remove("seed");
            }
        }
        graph.into_value()
    }

    #[tokio::test]
    async fn test_scalar_sets_only_that_field() {
        let client = Arc::new(RecordingClient::default());
        let source = template();
        let bound = binder(&client)
            .bind(&source, &[InputDescriptor::scalar("6-inputs-text", "a dog")])
            .await
            .unwrap();

        assert_eq!(
            bound.graph.node("6").unwrap().input("text"),
            Some(&json!("a dog"))
        );

        let mut expected = without_run_fields(source.clone());
        expected["6"]["inputs"]["text"] = json!("a dog");
        assert_eq!(without_run_fields(bound.graph), expected);
        assert!(bound.uploads.is_empty());
        assert!(client.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_template_is_not_mutated() {
        let client = Arc::new(RecordingClient::default());
        let source = template();
        let before = source.clone();
        binder(&client)
            .bind(
                &source,
                &[
                    InputDescriptor::scalar("5-inputs-steps", 30),
                    InputDescriptor::file("3-inputs-image", png("cat.png")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(source, before);
    }

    #[tokio::test]
    async fn test_null_inputs_are_skipped() {
        let client = Arc::new(RecordingClient::default());
        let bound = binder(&client)
            .bind(&template(), &[InputDescriptor::empty("6-inputs-text")])
            .await
            .unwrap();
        assert_eq!(
            bound.graph.node("6").unwrap().input("text"),
            Some(&json!("a cat"))
        );
    }

    #[tokio::test]
    async fn test_later_input_wins() {
        let client = Arc::new(RecordingClient::default());
        let bound = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::scalar("5-inputs-steps", 10),
                    InputDescriptor::scalar("5-inputs-steps", 40),
                ],
            )
            .await
            .unwrap();
        assert_eq!(bound.graph.node("5").unwrap().input("steps"), Some(&json!(40)));
    }

    #[tokio::test]
    async fn test_file_input_is_uploaded_once() {
        let client = Arc::new(RecordingClient::renaming("srv_"));
        let binder = binder(&client);
        let bound = binder
            .bind(
                &template(),
                &[InputDescriptor::file("3-inputs-image", png("image.png"))],
            )
            .await
            .unwrap();

        let uploads = client.uploads.lock();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].kind, UploadKind::Image);
        assert!(uploads[0].overwrite);
        assert_eq!(uploads[0].content_type.as_deref(), Some("image/png"));

        let sent = &uploads[0].file_name;
        assert!(sent.starts_with(&binder.filename_prefix()));
        assert!(sent.ends_with("_image.png"));
        let suffix = &sent[binder.filename_prefix().len()..sent.len() - "_image.png".len()];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        let assigned = format!("srv_{}", sent);
        assert_eq!(
            bound.graph.node("3").unwrap().input("image"),
            Some(&json!(assigned))
        );
        assert_eq!(
            bound.uploads,
            vec![UploadRecord {
                key_path: "3-inputs-image".to_string(),
                original_name: "image.png".to_string(),
                engine_assigned_name: assigned,
            }]
        );
    }

    #[tokio::test]
    async fn test_same_name_uploads_do_not_collide() {
        let client = Arc::new(RecordingClient::default());
        binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image", png("image.png")),
                    InputDescriptor::file("3-inputs-image", png("image.png")),
                ],
            )
            .await
            .unwrap();
        let names = client.uploaded_names();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
    }

    #[tokio::test]
    async fn test_finishing_pass() {
        let client = Arc::new(RecordingClient::default());
        let binder = binder(&client);
        let bound = binder.bind(&template(), &[]).await.unwrap();

        assert_eq!(
            bound.graph.node("9").unwrap().input("filename_prefix"),
            Some(&json!(binder.filename_prefix()))
        );
        let seed = bound.graph.node("5").unwrap().input("seed").unwrap();
        assert!(!is_seed_sentinel(seed));
        assert!(seed.as_u64().unwrap() < nodes::SEED_UPPER_BOUND);
    }

    #[tokio::test]
    async fn test_binds_differ_only_in_run_fields() {
        let inputs = [InputDescriptor::scalar("6-inputs-text", "a fox")];
        let first = binder(&Arc::new(RecordingClient::default()))
            .bind(&template(), &inputs)
            .await
            .unwrap();
        let second = binder(&Arc::new(RecordingClient::default()))
            .bind(&template(), &inputs)
            .await
            .unwrap();

        assert_ne!(
            first.graph.node("9").unwrap().input("filename_prefix"),
            second.graph.node("9").unwrap().input("filename_prefix")
        );
        assert_eq!(
            without_run_fields(first.graph),
            without_run_fields(second.graph)
        );
    }

    #[tokio::test]
    async fn test_sentinel_seeds_differ_across_binds() {
        let client = Arc::new(RecordingClient::default());
        let binder = binder(&client);
        let mut seeds = std::collections::HashSet::new();
        for _ in 0..8 {
            let bound = binder.bind(&template(), &[]).await.unwrap();
            seeds.insert(bound.graph.node("5").unwrap().input("seed").cloned().unwrap().to_string());
        }
        assert!(seeds.len() > 1);
    }

    #[tokio::test]
    async fn test_explicit_seed_is_kept() {
        let client = Arc::new(RecordingClient::default());
        let bound = binder(&client)
            .bind(&template(), &[InputDescriptor::scalar("5-inputs-seed", 1234)])
            .await
            .unwrap();
        assert_eq!(bound.graph.node("5").unwrap().input("seed"), Some(&json!(1234)));
    }

    #[tokio::test]
    async fn test_mask_protocol() {
        let client = Arc::new(RecordingClient::renaming("srv_"));
        let binder = binder(&client);
        let run = binder.run_id().to_string();
        let bound = binder
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image", png("photo.png")),
                    InputDescriptor::file("3-inputs-image-viewcomfymask", mask_png()),
                ],
            )
            .await
            .unwrap();

        let uploads = client.uploads.lock();
        assert_eq!(uploads.len(), 4);
        let base_name = format!("srv_{}", uploads[0].file_name);

        let mask = &uploads[1];
        assert_eq!(mask.kind, UploadKind::Mask);
        assert_eq!(mask.file_name, format!("clipspace-mask-{}.png", run));
        assert_eq!(mask.subfolder.as_deref(), Some("clipspace"));
        assert_eq!(mask.bytes, Bytes::from_static(b"\x89PNG mask"));
        assert_eq!(mask.original_ref.as_ref().unwrap().filename, base_name);

        let painted = &uploads[2];
        assert_eq!(painted.kind, UploadKind::Image);
        assert_eq!(painted.file_name, format!("clipspace-painted-{}.png", run));
        assert_eq!(painted.bytes, Bytes::from_static(b"\x89PNG base"));
        assert_eq!(painted.original_ref.as_ref().unwrap().filename, base_name);

        let masked = &uploads[3];
        assert_eq!(masked.kind, UploadKind::Mask);
        assert_eq!(
            masked.file_name,
            format!("clipspace-painted-masked-{}.png", run)
        );
        let painted_ref = masked.original_ref.as_ref().unwrap();
        assert_eq!(painted_ref.filename, format!("srv_clipspace-painted-{}.png", run));
        assert_eq!(painted_ref.subfolder, "clipspace");

        assert_eq!(
            bound.graph.node("3").unwrap().input("image"),
            Some(&json!(format!(
                "clipspace/clipspace-painted-masked-{}.png [input]",
                run
            )))
        );
        assert_eq!(bound.uploads.len(), 1);
    }

    #[tokio::test]
    async fn test_mask_without_base_fails_before_upload() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image-viewcomfymask", mask_png()),
                    InputDescriptor::file("3-inputs-image", png("photo.png")),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BindError::MaskBaseMissing { .. }));
        assert!(client.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_mask_over_scalar_base_fails() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::scalar("3-inputs-image", "already-there.png"),
                    InputDescriptor::file("3-inputs-image-viewcomfymask", mask_png()),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::MaskBaseMissing { .. }));
    }

    #[tokio::test]
    async fn test_scalar_mask_is_rejected() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image", png("photo.png")),
                    InputDescriptor::scalar("3-inputs-image-viewcomfymask", "mask.png"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::MaskNotAFile { .. }));
    }

    #[tokio::test]
    async fn test_unresolved_path_fails_before_upload() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image", png("photo.png")),
                    InputDescriptor::scalar("42-inputs-text", "nope"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BindError::Resolution(_)));
        assert!(client.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_input_writes_inside_earlier_value() {
        let client = Arc::new(RecordingClient::default());
        let bound = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::scalar("5-inputs-opts", json!({ "a": 1 })),
                    InputDescriptor::scalar("5-inputs-opts-a", 2),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            bound.graph.node("5").unwrap().input("opts"),
            Some(&json!({ "a": 2 }))
        );
    }

    #[tokio::test]
    async fn test_replaced_container_fails_before_upload() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(
                &template(),
                &[
                    InputDescriptor::file("3-inputs-image", png("photo.png")),
                    InputDescriptor::scalar("5-inputs", 7),
                    InputDescriptor::scalar("5-inputs-steps", 30),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BindError::Resolution(_)));
        assert!(client.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_path() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(&template(), &[InputDescriptor::scalar("3--image", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_upload_rejection() {
        let client = Arc::new(RecordingClient::rejecting("photo"));
        let err = binder(&client)
            .bind(
                &template(),
                &[InputDescriptor::file("3-inputs-image", png("photo.png"))],
            )
            .await
            .unwrap_err();

        match err {
            BindError::Upload {
                key_path, source, ..
            } => {
                assert_eq!(key_path, "3-inputs-image");
                assert!(matches!(source, EngineError::UploadRejected { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_templates() {
        let client = Arc::new(RecordingClient::default());
        let err = binder(&client)
            .bind(&WorkflowGraph::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::EmptyTemplate));

        let dangling = WorkflowGraph::try_from(json!({
            "9": { "class_type": "SaveImage", "inputs": { "images": ["8", 0] } }
        }))
        .unwrap();
        let err = binder(&client).bind(&dangling, &[]).await.unwrap_err();
        assert!(matches!(err, BindError::InvalidTemplate(_)));
    }
}
