//! Progress snapshots emitted while a transfer is streaming.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::size::format_size;

/// Lifecycle state of a transfer.
///
/// `Resolving → Streaming → Completed | Failed`, or any state → `Cancelled`.
/// The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Resolving,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Immutable snapshot of one transfer's progress, built once per chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Name of the destination file.
    pub file_name: String,
    /// Full destination path.
    pub file_path: PathBuf,
    /// Declared body length; `None` when the server sent no `Content-Length`.
    pub total_bytes: Option<u64>,
    /// Bytes written so far. Never decreases within a transfer.
    pub bytes_downloaded: u64,
    /// Time since streaming began.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl ProgressSample {
    /// Completed share in percent.
    ///
    /// Zero whenever the total is unknown or zero, so this never divides by
    /// zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => self.bytes_downloaded as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Average throughput in bytes per second since streaming began.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_downloaded as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated time to finish at the current average speed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time_remaining(&self) -> Option<Duration> {
        let total = self.total_bytes?;
        let speed = self.speed();
        if speed <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_downloaded) as f64;
        Some(Duration::from_secs_f64(remaining / speed))
    }

    /// Human-readable total size (`"?"` when unknown).
    #[must_use]
    pub fn total_size_formatted(&self) -> String {
        self.total_bytes
            .map_or_else(|| "?".to_string(), format_size)
    }

    /// Human-readable downloaded size.
    #[must_use]
    pub fn downloaded_size_formatted(&self) -> String {
        format_size(self.bytes_downloaded)
    }

    /// Human-readable speed, e.g. `"1.50 MB/s"`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn speed_formatted(&self) -> String {
        format!("{}/s", format_size(self.speed() as u64))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}
