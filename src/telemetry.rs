//! Logging sink injected into the engine and registry.
//!
//! Components never reach for a global logger: each one is handed an
//! `Arc<dyn Telemetry>` at construction. The process-wide `tracing`
//! subscriber is installed by the binary entry point only, and
//! [`TracingTelemetry`] forwards into it.

use std::error::Error;
use std::fmt;

use tracing::{error, info, warn};

/// Three-severity logging contract.
///
/// Implementations are fire-and-forget: they return nothing, and a failure
/// inside a sink must never change the outcome of a transfer.
pub trait Telemetry: Send + Sync + fmt::Debug {
    /// Lifecycle milestones (resolved, started, completed).
    fn info(&self, message: &str);

    /// Non-fatal anomalies, e.g. a cleanup-time deletion that failed.
    fn warn(&self, message: &str);

    /// Failures, with the error that caused them.
    fn error(&self, message: &str, cause: &(dyn Error + 'static));
}

/// [`Telemetry`] backed by `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    /// Creates the tracing-backed sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Telemetry for TracingTelemetry {
    fn info(&self, message: &str) {
        info!(target: "any_downloader", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "any_downloader", "{message}");
    }

    fn error(&self, message: &str, cause: &(dyn Error + 'static)) {
        error!(target: "any_downloader", error = %cause, "{message}");
    }
}
