//! Writing the artifact stream to disk

use std::path::{Path, PathBuf};

use execution_gateway::{FrameDecoder, FrameError, FrameEvent, FramedStream};
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact stream: {0}")]
    Frame(#[from] FrameError),

    #[error("Refusing to write artifact '{0}' outside the output directory")]
    UnsafeName(String),
}

/// Copy the framed stream into `writer` chunk by chunk, returning the byte count
pub async fn copy_stream<W>(mut stream: FramedStream, writer: &mut W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

/// Write the framed stream to `path`, or stdout for `-`
pub async fn write_framed(stream: FramedStream, path: &Path) -> Result<u64, OutputError> {
    let write_error = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    if path == Path::new("-") {
        let mut stdout = tokio::io::stdout();
        return copy_stream(stream, &mut stdout).await.map_err(write_error);
    }
    let mut file = File::create(path).await.map_err(write_error)?;
    copy_stream(stream, &mut file).await.map_err(write_error)
}

/// The artifact currently being written by [`unpack_frames`]
struct OpenArtifact {
    path: PathBuf,
    file: File,
    content_type: String,
    written: u64,
}

/// Decode the stream and save each artifact under its own name in `dir`.
///
/// Bodies are written as their chunks arrive, one file open at a time.
pub async fn unpack_frames(mut stream: FramedStream, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| OutputError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut decoder = FrameDecoder::new();
    let mut current: Option<OpenArtifact> = None;
    let mut saved = Vec::new();

    while let Some(chunk) = stream.next().await {
        for event in decoder.push(&chunk)? {
            match event {
                FrameEvent::Start {
                    content_type,
                    filename,
                } => {
                    let path = dir.join(plain_file_name(&filename)?);
                    let file = File::create(&path)
                        .await
                        .map_err(|source| OutputError::Write {
                            path: path.clone(),
                            source,
                        })?;
                    current = Some(OpenArtifact {
                        path,
                        file,
                        content_type,
                        written: 0,
                    });
                }
                FrameEvent::Body(bytes) => {
                    if let Some(open) = current.as_mut() {
                        open.file
                            .write_all(&bytes)
                            .await
                            .map_err(|source| OutputError::Write {
                                path: open.path.clone(),
                                source,
                            })?;
                        open.written += bytes.len() as u64;
                    }
                }
                FrameEvent::End => {
                    if let Some(mut open) = current.take() {
                        open.file
                            .flush()
                            .await
                            .map_err(|source| OutputError::Write {
                                path: open.path.clone(),
                                source,
                            })?;
                        log::info!(
                            "Saved {} ({}, {} bytes)",
                            open.path.display(),
                            open.content_type,
                            open.written
                        );
                        saved.push(open.path);
                    }
                }
            }
        }
    }
    decoder.finish()?;

    Ok(saved)
}

/// Artifact names must be a single path component
fn plain_file_name(filename: &str) -> Result<&std::ffi::OsStr, OutputError> {
    Path::new(filename)
        .file_name()
        .filter(|name| *name == filename)
        .ok_or_else(|| OutputError::UnsafeName(filename.to_string()))
}
