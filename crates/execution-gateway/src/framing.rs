//! Multi-artifact framing

use bytes::{Buf, Bytes, BytesMut};

/// Terminates every artifact body
pub const SEPARATOR: &[u8] = b"\r\n--BLOB_SEPARATOR--\r\n";

/// Used when neither the engine nor the file name tells the type
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPE_PREFIX: &str = "Content-Type: ";
const DISPOSITION_PREFIX: &str = "Content-Disposition: attachment; filename=\"";
const DISPOSITION_SUFFIX: &str = "\"";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// The two header lines opening an artifact
pub fn frame_header(content_type: &str, filename: &str) -> Bytes {
    Bytes::from(format!(
        "{}{}\r\n\r\n{}{}{}\r\n\r\n",
        CONTENT_TYPE_PREFIX, content_type, DISPOSITION_PREFIX, filename, DISPOSITION_SUFFIX
    ))
}

/// The engine's content type, else a guess from the file name
pub fn resolve_content_type(reported: Option<&str>, filename: &str) -> String {
    reported
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_path(filename)
                .first_raw()
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

/// One decoded artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub content_type: String,
    pub filename: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame {index}: missing {header} header")]
    MissingHeader { index: usize, header: &'static str },

    #[error("Frame {index}: header is not valid UTF-8")]
    InvalidHeader { index: usize },

    #[error("Frame {index}: body is not terminated by the separator")]
    Unterminated { index: usize },
}

/// Largest header block accepted before the decoder gives up on a frame
const MAX_HEADER_LEN: usize = 64 * 1024;

/// A piece of the framed stream, emitted as soon as it is recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Both headers of the next artifact
    Start {
        content_type: String,
        filename: String,
    },
    /// Body bytes of the current artifact
    Body(Bytes),
    /// The separator closing the current artifact
    End,
}

/// Incremental decoder for the framed stream.
///
/// Between calls it holds at most one partial header block, or less than a
/// separator's worth of body bytes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    in_body: bool,
    index: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<FrameEvent>, FrameError> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            if self.in_body {
                let Some(end) = find(&self.buffer, SEPARATOR) else {
                    let ready = self.buffer.len().saturating_sub(SEPARATOR.len() - 1);
                    if ready > 0 {
                        events.push(FrameEvent::Body(self.buffer.split_to(ready).freeze()));
                    }
                    break;
                };
                if end > 0 {
                    events.push(FrameEvent::Body(self.buffer.split_to(end).freeze()));
                }
                self.buffer.advance(SEPARATOR.len());
                events.push(FrameEvent::End);
                self.in_body = false;
                self.index += 1;
            } else {
                let Some((content_type, filename, len)) = self.read_headers()? else {
                    break;
                };
                self.buffer.advance(len);
                events.push(FrameEvent::Start {
                    content_type,
                    filename,
                });
                self.in_body = true;
            }
        }

        Ok(events)
    }

    /// Check that the stream ended on a frame boundary
    pub fn finish(&self) -> Result<(), FrameError> {
        let index = self.index;
        if self.in_body {
            return Err(FrameError::Unterminated { index });
        }
        if self.buffer.is_empty() {
            return Ok(());
        }
        let header = if find(&self.buffer, HEADER_END).is_some() {
            "Content-Disposition"
        } else {
            "Content-Type"
        };
        Err(FrameError::MissingHeader { index, header })
    }

    fn read_headers(&self) -> Result<Option<(String, String, usize)>, FrameError> {
        let index = self.index;
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let Some(first) = find(&self.buffer, HEADER_END) else {
            return self.incomplete("Content-Type");
        };
        let content_type = header_line(&self.buffer[..first], index)?
            .strip_prefix(CONTENT_TYPE_PREFIX)
            .ok_or(FrameError::MissingHeader {
                index,
                header: "Content-Type",
            })?
            .to_string();

        let rest = first + HEADER_END.len();
        let Some(second) = find(&self.buffer[rest..], HEADER_END) else {
            return self.incomplete("Content-Disposition");
        };
        let filename = header_line(&self.buffer[rest..rest + second], index)?
            .strip_prefix(DISPOSITION_PREFIX)
            .and_then(|rest| rest.strip_suffix(DISPOSITION_SUFFIX))
            .ok_or(FrameError::MissingHeader {
                index,
                header: "Content-Disposition",
            })?
            .to_string();

        Ok(Some((content_type, filename, rest + second + HEADER_END.len())))
    }

    fn incomplete<T>(&self, header: &'static str) -> Result<Option<T>, FrameError> {
        if self.buffer.len() > MAX_HEADER_LEN {
            return Err(FrameError::MissingHeader {
                index: self.index,
                header,
            });
        }
        Ok(None)
    }
}

/// Decode a complete framed stream back into its artifacts
pub fn split_frames(data: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut current = None;
    let mut body = BytesMut::new();

    for event in decoder.push(data)? {
        match event {
            FrameEvent::Start {
                content_type,
                filename,
            } => current = Some((content_type, filename)),
            FrameEvent::Body(chunk) => body.extend_from_slice(&chunk),
            FrameEvent::End => {
                if let Some((content_type, filename)) = current.take() {
                    frames.push(Frame {
                        content_type,
                        filename,
                        body: body.split().freeze(),
                    });
                }
            }
        }
    }
    decoder.finish()?;

    Ok(frames)
}

fn header_line(line: &[u8], index: usize) -> Result<&str, FrameError> {
    std::str::from_utf8(line).map_err(|_| FrameError::InvalidHeader { index })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
