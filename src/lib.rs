//! Any-Downloader Core Library
//!
//! This library streams remote HTTP resources to local storage while tracking
//! many concurrent transfers, reporting live progress and supporting
//! cooperative cancellation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transfer`] - Destination resolution and the streaming transfer engine
//! - [`registry`] - Registry of in-flight transfers (start / cancel / resume)
//! - [`transport`] - HTTP capability used by the engine (headers + body stream)
//! - [`store`] - Filesystem capability used by the engine
//! - [`telemetry`] - Injected logging sink with three severities
//! - [`size`] - Human-readable byte counts for display

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod registry;
pub mod size;
pub mod store;
pub mod telemetry;
pub mod transfer;
pub mod transport;

// Re-export commonly used types
pub use registry::{
    ActiveTransfer, ProgressSink, TransferHandle, TransferId, TransferOutcome, TransferRegistry,
    default_download_dir,
};
pub use size::format_size;
pub use store::{FileStore, LocalFileStore};
pub use telemetry::{Telemetry, TracingTelemetry};
pub use transfer::{
    DEFAULT_CHUNK_SIZE, EngineConfig, PART_SUFFIX, ProgressCallback, ProgressSample,
    TransferEngine, TransferError, TransferErrorKind, TransferReport, TransferState,
    parse_source_url,
};
pub use transport::{HttpTransport, HttpTransportConfig, ResponseHead, StreamingResponse, Transport};
