//! Execution gateway
//!
//! Submits a bound workflow to the engine and hands back the artifact list
//! together with a lazy byte stream. The stream carries every artifact in
//! engine order, each framed as:
//!
//! ```text
//! Content-Type: <mime>\r\n\r\n
//! Content-Disposition: attachment; filename="<name>"\r\n\r\n
//! <raw bytes>
//! \r\n--BLOB_SEPARATOR--\r\n
//! ```
//!
//! Artifacts are fetched one at a time as the stream is polled. The engine
//! session is closed once the stream finishes, fails to start, or is dropped.

pub mod error;
pub mod framing;
pub mod gateway;
pub mod local;
mod session;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, GatewayError};
pub use framing::{split_frames, Frame, FrameDecoder, FrameError, FrameEvent, SEPARATOR};
pub use gateway::{Execution, ExecutionGateway, FramedStream};
pub use local::LocalOutputDir;
