//! Data exchanged with the engine

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::constants::endpoints;
use crate::error::EngineError;

/// Stream of artifact bytes as they arrive from the engine
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, EngineError>> + Send>>;

/// Which engine folder a file lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Produced by the run
    #[default]
    Output,
    /// An uploaded input echoed back by the engine
    Input,
    /// Preview files the engine discards
    Temp,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Output => "output",
            ArtifactKind::Input => "input",
            ArtifactKind::Temp => "temp",
        }
    }
}

/// One file the engine reported for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub kind: ArtifactKind,
    /// The file sits in the engine's output directory and may be read from disk
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
}

impl ArtifactDescriptor {
    /// An output artifact in the root output folder
    pub fn output(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: String::new(),
            kind: ArtifactKind::Output,
            local: false,
        }
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = subfolder.into();
        self
    }

    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Engine-relative viewer path, e.g. `/view?filename=a.png&subfolder=&type=output`
    pub fn view_path(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("filename", &self.filename)
            .append_pair("subfolder", &self.subfolder)
            .append_pair("type", self.kind.as_str())
            .finish();
        format!("{}?{}", endpoints::VIEW, query)
    }
}

/// The artifact a history record should point at: the first run output
pub fn primary_output(artifacts: &[ArtifactDescriptor]) -> Option<&ArtifactDescriptor> {
    artifacts
        .iter()
        .find(|artifact| artifact.kind == ArtifactKind::Output)
}

/// Which upload endpoint receives an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Mask,
}

/// Reference to a file already known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

impl FileRef {
    /// A file in the engine's input folder
    pub fn input(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: String::new(),
            kind: ArtifactKind::Input,
        }
    }
}

/// An asset to push to the engine
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub file_name: String,
    pub kind: UploadKind,
    pub overwrite: bool,
    pub subfolder: Option<String>,
    pub original_ref: Option<FileRef>,
    pub content_type: Option<String>,
}

impl UploadRequest {
    /// An input image, overwriting any same-named file
    pub fn image(file_name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            kind: UploadKind::Image,
            overwrite: true,
            subfolder: None,
            original_ref: None,
            content_type: None,
        }
    }

    /// A mask layered over `original_ref`
    pub fn mask(file_name: impl Into<String>, bytes: Bytes, original_ref: FileRef) -> Self {
        Self {
            kind: UploadKind::Mask,
            original_ref: Some(original_ref),
            ..Self::image(file_name, bytes)
        }
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = Some(subfolder.into());
        self
    }

    pub fn with_original_ref(mut self, original_ref: FileRef) -> Self {
        self.original_ref = Some(original_ref);
        self
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

/// The engine's answer to an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Name the engine stored the file under; may differ from the request
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// An artifact body being streamed from the engine
pub struct FetchedArtifact {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for FetchedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedArtifact")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_from_history_item() {
        let item = json!({ "filename": "run_00001_.png", "subfolder": "", "type": "output" });
        let descriptor: ArtifactDescriptor = serde_json::from_value(item).unwrap();
        assert_eq!(descriptor, ArtifactDescriptor::output("run_00001_.png"));
    }

    #[test]
    fn test_view_path_encodes() {
        let descriptor = ArtifactDescriptor::output("my image (1).png").with_subfolder("a/b");
        assert_eq!(
            descriptor.view_path(),
            "/view?filename=my+image+%281%29.png&subfolder=a%2Fb&type=output"
        );
    }

    #[test]
    fn test_primary_output_skips_inputs() {
        let artifacts = vec![
            ArtifactDescriptor::output("echo.png").with_kind(ArtifactKind::Input),
            ArtifactDescriptor::output("result.png"),
        ];
        assert_eq!(primary_output(&artifacts).unwrap().filename, "result.png");
        assert!(primary_output(&artifacts[..1]).is_none());
    }

    #[test]
    fn test_file_ref_serializes_like_engine() {
        let value = serde_json::to_value(FileRef::input("cat.png")).unwrap();
        assert_eq!(
            value,
            json!({ "filename": "cat.png", "subfolder": "", "type": "input" })
        );
    }

    #[test]
    fn test_mask_request_defaults() {
        let request = UploadRequest::mask("m.png", Bytes::from_static(b"m"), FileRef::input("a.png"));
        assert_eq!(request.kind, UploadKind::Mask);
        assert!(request.overwrite);
        assert_eq!(request.original_ref, Some(FileRef::input("a.png")));
    }
}
