//! Reading artifacts straight from the engine's output directory

use std::io;
use std::path::{Component, Path, PathBuf};

use engine_client::{ArtifactDescriptor, EngineError, FetchedArtifact};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

/// The engine's output directory, when it is mounted locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOutputDir {
    root: PathBuf,
}

impl LocalOutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact inside the directory.
    ///
    /// Names that would escape the directory are rejected.
    pub fn path_for(&self, artifact: &ArtifactDescriptor) -> Result<PathBuf, EngineError> {
        let relative = Path::new(&artifact.subfolder).join(&artifact.filename);
        let escapes = artifact.filename.is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)));
        if escapes {
            return Err(EngineError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Artifact path '{}' leaves the output directory",
                    relative.display()
                ),
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Open an artifact as a byte stream
    pub async fn open(&self, artifact: &ArtifactDescriptor) -> Result<FetchedArtifact, EngineError> {
        let path = self.path_for(artifact)?;
        let file = tokio::fs::File::open(&path).await?;
        log::debug!("Reading {} from {}", artifact.filename, path.display());

        let body = ReaderStream::new(file).map(|chunk| chunk.map_err(EngineError::Io));
        Ok(FetchedArtifact {
            content_type: None,
            body: Box::pin(body),
        })
    }
}
