//! Progress rendering: indicatif bars, NDJSON events, or nothing.

use std::path::Path;
use std::time::{Duration, Instant};

use any_downloader_core::{ProgressSample, ProgressSink, TransferError, TransferId, TransferReport};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

/// Minimum spacing between two JSON progress lines for one transfer.
const JSON_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

const BAR_TEMPLATE: &str =
    "{spinner} {msg:30!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes} {bytes_per_sec}";

/// How progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressMode {
    Bars,
    Json,
    Silent,
}

/// One line of `--json` output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum Event<'a> {
    Started {
        id: TransferId,
        url: &'a str,
        path: &'a Path,
    },
    Progress {
        url: &'a str,
        #[serde(flatten)]
        sample: &'a ProgressSample,
    },
    Completed {
        id: TransferId,
        url: &'a str,
        path: &'a Path,
        bytes_downloaded: u64,
    },
    Cancelled {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<TransferId>,
        url: &'a str,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<TransferId>,
        url: &'a str,
        kind: String,
        error: String,
    },
}

fn emit(event: &Event<'_>) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(%error, "Failed to serialize progress event"),
    }
}

/// Per-transfer display state returned by [`ProgressReporter::track`].
pub(crate) struct TrackedTransfer {
    pub sink: Option<ProgressSink>,
    bar: Option<ProgressBar>,
}

/// Renders progress and outcomes for a whole run.
pub(crate) struct ProgressReporter {
    mode: ProgressMode,
    multi: MultiProgress,
}

impl ProgressReporter {
    pub(crate) fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            multi: MultiProgress::new(),
        }
    }

    pub(crate) fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Prepares the progress sink for one URL.
    pub(crate) fn track(&self, url: &str) -> TrackedTransfer {
        match self.mode {
            ProgressMode::Bars => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style());
                bar.set_message(url.to_string());
                bar.enable_steady_tick(Duration::from_millis(120));
                TrackedTransfer {
                    sink: Some(bar_sink(bar.clone())),
                    bar: Some(bar),
                }
            }
            ProgressMode::Json => TrackedTransfer {
                sink: Some(json_sink(url.to_string())),
                bar: None,
            },
            ProgressMode::Silent => TrackedTransfer {
                sink: None,
                bar: None,
            },
        }
    }

    pub(crate) fn started(&self, id: TransferId, url: &str, path: &Path) {
        match self.mode {
            ProgressMode::Json => emit(&Event::Started { id, url, path }),
            ProgressMode::Bars | ProgressMode::Silent => {
                info!(%id, url, path = %path.display(), "Transfer started");
            }
        }
    }

    pub(crate) fn completed(
        &self,
        tracked: &TrackedTransfer,
        id: TransferId,
        url: &str,
        report: &TransferReport,
    ) {
        match self.mode {
            ProgressMode::Json => emit(&Event::Completed {
                id,
                url,
                path: &report.path,
                bytes_downloaded: report.bytes_downloaded,
            }),
            ProgressMode::Bars => {
                if let Some(bar) = &tracked.bar {
                    bar.finish_with_message(format!("done {}", report.path.display()));
                }
            }
            ProgressMode::Silent => {
                info!(
                    path = %report.path.display(),
                    size = %any_downloader_core::format_size(report.bytes_downloaded),
                    "Downloaded"
                );
            }
        }
    }

    /// Reports a cancellation. `tracked` is `None` for URLs skipped after an
    /// interrupt.
    pub(crate) fn cancelled(
        &self,
        tracked: Option<&TrackedTransfer>,
        id: Option<TransferId>,
        url: &str,
    ) {
        match self.mode {
            ProgressMode::Json => emit(&Event::Cancelled { id, url }),
            ProgressMode::Bars => match tracked.and_then(|t| t.bar.as_ref()) {
                Some(bar) => bar.abandon_with_message(format!("cancelled {url}")),
                None => {
                    let _ = self.multi.println(format!("cancelled {url}"));
                }
            },
            ProgressMode::Silent => info!(?id, url, "Cancelled"),
        }
    }

    /// Reports a failure. `tracked` is `None` when the transfer never
    /// started (bad URL, resolution error).
    pub(crate) fn failed(
        &self,
        tracked: Option<&TrackedTransfer>,
        id: Option<TransferId>,
        url: &str,
        error: &TransferError,
    ) {
        match self.mode {
            ProgressMode::Json => emit(&Event::Failed {
                id,
                url,
                kind: error.kind().to_string(),
                error: error.to_string(),
            }),
            ProgressMode::Bars => match tracked.and_then(|t| t.bar.as_ref()) {
                Some(bar) => bar.abandon_with_message(format!("failed {url}: {error}")),
                None => {
                    // Keep the message above the live bars
                    let _ = self.multi.println(format!("failed {url}: {error}"));
                }
            },
            ProgressMode::Silent => {
                error!(url, kind = %error.kind(), %error, "Transfer failed");
            }
        }
    }

    /// Removes a bar that never got a transfer behind it.
    pub(crate) fn discard(&self, tracked: TrackedTransfer) {
        if let Some(bar) = tracked.bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_sink(bar: ProgressBar) -> ProgressSink {
    let mut has_length = false;
    Box::new(move |sample: ProgressSample| {
        if !has_length && let Some(total) = sample.total_bytes {
            bar.set_length(total);
            bar.set_style(bar_style());
            has_length = true;
        }
        bar.set_message(sample.file_name);
        bar.set_position(sample.bytes_downloaded);
    })
}

fn json_sink(url: String) -> ProgressSink {
    let mut last_emitted: Option<Instant> = None;
    Box::new(move |sample: ProgressSample| {
        let now = Instant::now();
        let finished = sample.total_bytes == Some(sample.bytes_downloaded);
        let due = last_emitted.is_none_or(|at| now.duration_since(at) >= JSON_PROGRESS_INTERVAL);
        if finished || due {
            last_emitted = Some(now);
            emit(&Event::Progress {
                url: &url,
                sample: &sample,
            });
        }
    })
}
