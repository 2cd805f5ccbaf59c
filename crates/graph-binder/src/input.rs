//! Caller inputs and the upload manifest

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

/// A file supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Name the caller gave the file
    pub name: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Declared content type, else a guess from the file name
    pub(crate) fn resolved_content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            mime_guess::from_path(&self.name)
                .first_raw()
                .map(str::to_string)
        })
    }
}

/// The value bound at a key path
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Any JSON value, written as-is
    Scalar(Value),
    /// A file, uploaded and replaced by its engine-assigned name
    File(FilePayload),
}

impl InputValue {
    pub fn as_file(&self) -> Option<&FilePayload> {
        match self {
            InputValue::File(file) => Some(file),
            InputValue::Scalar(_) => None,
        }
    }
}

/// One caller input
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    /// `-`-delimited path such as `3-inputs-image`
    pub key_path: String,
    /// `None` inputs are skipped
    pub value: Option<InputValue>,
}

impl InputDescriptor {
    pub fn scalar(key_path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key_path: key_path.into(),
            value: Some(InputValue::Scalar(value.into())),
        }
    }

    pub fn file(key_path: impl Into<String>, file: FilePayload) -> Self {
        Self {
            key_path: key_path.into(),
            value: Some(InputValue::File(file)),
        }
    }

    pub fn empty(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            value: None,
        }
    }
}

/// One uploaded file, for history and auditing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    pub key_path: String,
    pub original_name: String,
    pub engine_assigned_name: String,
}
