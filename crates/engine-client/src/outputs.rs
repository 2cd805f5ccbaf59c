//! Artifact discovery from a finished history entry
//!
//! Each node's output object maps a media key (`images`, `gifs`, `videos`,
//! `audio`, ...) to a list of entries. File entries are objects with a
//! `filename`; some custom nodes instead emit a JSON string describing a file
//! they wrote into the output directory.

use serde_json::Value;

use crate::types::{ArtifactDescriptor, ArtifactKind};

/// Collect descriptors in the order the engine reported them.
///
/// Temp previews and non-file entries are skipped.
pub fn collect_artifacts(outputs: &Value) -> Vec<ArtifactDescriptor> {
    let mut artifacts = Vec::new();
    let Some(nodes) = outputs.as_object() else {
        return artifacts;
    };

    for (node_id, node_output) in nodes {
        let Some(media) = node_output.as_object() else {
            continue;
        };
        for (media_key, entries) in media {
            for entry in entries.as_array().into_iter().flatten() {
                match descriptor_from_entry(entry) {
                    Some(artifact) if artifact.kind == ArtifactKind::Temp => {
                        log::trace!(
                            "Skipping temp preview {} from node {}",
                            artifact.filename,
                            node_id
                        );
                    }
                    Some(artifact) => artifacts.push(artifact),
                    None => log::trace!(
                        "Ignoring non-file '{}' entry from node {}",
                        media_key,
                        node_id
                    ),
                }
            }
        }
    }
    artifacts
}

fn descriptor_from_entry(entry: &Value) -> Option<ArtifactDescriptor> {
    match entry {
        Value::Object(fields) if fields.contains_key("filename") => {
            let artifact: ArtifactDescriptor = serde_json::from_value(entry.clone()).ok()?;
            (!artifact.filename.is_empty()).then_some(artifact)
        }
        Value::String(text) => {
            let value: Value = serde_json::from_str(text).ok()?;
            if value.get("type")?.as_str()? != ArtifactKind::Output.as_str() {
                return None;
            }
            let filename = value.get("filename")?.as_str()?;
            if filename.is_empty() {
                return None;
            }
            let subfolder = value
                .get("subfolder")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(
                ArtifactDescriptor::output(filename)
                    .with_subfolder(subfolder)
                    .local(),
            )
        }
        _ => None,
    }
}
