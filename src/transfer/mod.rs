//! Destination resolution and streaming transfers.
//!
//! - [`TransferEngine`] - resolves a destination path and streams a body
//!   into it through a `.part` file
//! - [`ProgressSample`] / [`TransferState`] - what observers see
//! - [`TransferError`] - every failure the engine and registry report
//! - [`filename`] - name selection from `Content-Disposition`, the URL and
//!   `Content-Type`

mod engine;
mod error;
pub mod filename;
mod progress;

pub use engine::{
    DEFAULT_CHUNK_SIZE, EngineConfig, PART_SUFFIX, ProgressCallback, TransferEngine,
    TransferReport, ensure_supported_scheme, parse_source_url, part_path,
};
pub use error::{BoxError, TransferError, TransferErrorKind};
pub use progress::{ProgressSample, TransferState};
