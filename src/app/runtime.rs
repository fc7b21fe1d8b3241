//! Wires the library together for one CLI run.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use any_downloader_core::{
    EngineConfig, HttpTransport, LocalFileStore, TracingTelemetry, TransferEngine, TransferHandle,
    TransferOutcome, TransferRegistry, parse_source_url,
};
use clap::Parser;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::exit_handler::{ProcessExit, determine_exit_outcome};
use crate::app::progress::{ProgressMode, ProgressReporter, TrackedTransfer};
use crate::app::{config, input, terminal};
use crate::cli::Args;

/// Tally of finished transfers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunStats {
    completed: usize,
    cancelled: usize,
    failed: usize,
}

pub(crate) async fn run_downloader() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = config::load_default_file_config()?;
    let settings = config::resolve_settings(&args, file_config.as_ref())?;

    terminal::init_tracing(settings.log_level, terminal::no_color_env_requested());
    debug!(?args, ?settings, "CLI arguments parsed");

    let urls = input::collect_input(&args.urls)?;
    if urls.is_empty() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/file.pdf' | any-downloader");
        return Ok(ProcessExit::Success);
    }

    let transport = HttpTransport::with_config(&settings.transport_config())
        .context("Failed to build HTTP client")?;
    let engine = TransferEngine::with_config(
        Arc::new(transport),
        Arc::new(LocalFileStore::new()),
        Arc::new(TracingTelemetry::new()),
        EngineConfig {
            chunk_size: settings.chunk_size,
        },
    )?;
    let mut registry = TransferRegistry::new(Arc::new(engine));
    if let Some(dir) = settings.output_dir.clone() {
        registry = registry.with_default_dir(dir);
    }
    info!(
        urls = urls.len(),
        dir = %registry.default_dir().display(),
        "any-downloader starting"
    );

    let interrupt = CancellationToken::new();
    spawn_interrupt_handler(registry.clone(), interrupt.clone());

    let mode = if args.json {
        ProgressMode::Json
    } else if terminal::should_use_progress_bars(
        io::stderr().is_terminal(),
        settings.quiet,
        args.json,
        terminal::is_dumb_terminal(),
    ) {
        ProgressMode::Bars
    } else {
        ProgressMode::Silent
    };
    let reporter = ProgressReporter::new(mode);
    debug!(?mode, "progress mode selected");

    let (running, mut stats) = start_all(&registry, &reporter, &urls, &interrupt).await;

    let outcomes = join_all(running.into_iter().map(|(handle, tracked)| async move {
        let id = handle.id();
        let url = handle.url().to_string();
        (id, url, tracked, handle.wait().await)
    }))
    .await;

    for (id, url, tracked, outcome) in outcomes {
        match outcome {
            Ok(TransferOutcome::Completed(report)) => {
                stats.completed += 1;
                reporter.completed(&tracked, id, &url, &report);
            }
            Ok(TransferOutcome::Cancelled) => {
                stats.cancelled += 1;
                reporter.cancelled(Some(&tracked), Some(id), &url);
            }
            Err(error) => {
                stats.failed += 1;
                reporter.failed(Some(&tracked), Some(id), &url, &error);
            }
        }
    }

    if reporter.mode() != ProgressMode::Json {
        info!(
            completed = stats.completed,
            cancelled = stats.cancelled,
            failed = stats.failed,
            "Run finished"
        );
    }
    Ok(determine_exit_outcome(
        stats.completed + stats.cancelled,
        stats.failed,
    ))
}

/// Starts every URL in order. Once `interrupt` fires, remaining URLs are
/// skipped and counted as cancelled, and a transfer whose start was already
/// in flight is cancelled as soon as it registers.
async fn start_all(
    registry: &TransferRegistry,
    reporter: &ProgressReporter,
    urls: &[String],
    interrupt: &CancellationToken,
) -> (Vec<(TransferHandle, TrackedTransfer)>, RunStats) {
    let mut stats = RunStats::default();
    let mut running = Vec::with_capacity(urls.len());
    for raw in urls {
        if interrupt.is_cancelled() {
            stats.cancelled += 1;
            reporter.cancelled(None, None, raw);
            continue;
        }
        match start_one(registry, reporter, raw).await {
            Some((handle, tracked)) => {
                if interrupt.is_cancelled() {
                    // Registered after the interrupt handler swept the registry.
                    let _ = registry.cancel(handle.id());
                }
                running.push((handle, tracked));
            }
            None => stats.failed += 1,
        }
    }
    (running, stats)
}

/// Validates and starts one URL. Failures are reported and yield `None`.
async fn start_one(
    registry: &TransferRegistry,
    reporter: &ProgressReporter,
    raw: &str,
) -> Option<(TransferHandle, TrackedTransfer)> {
    let url = match parse_source_url(raw) {
        Ok(url) => url,
        Err(error) => {
            warn!(input = raw, %error, "Skipping invalid URL");
            reporter.failed(None, None, raw, &error);
            return None;
        }
    };

    let mut tracked = reporter.track(url.as_str());
    match registry.start(&url, None, tracked.sink.take()).await {
        Ok(handle) => {
            reporter.started(handle.id(), url.as_str(), handle.resolved_path());
            Some((handle, tracked))
        }
        Err(error) => {
            reporter.discard(tracked);
            reporter.failed(None, None, url.as_str(), &error);
            None
        }
    }
}

/// Every Ctrl-C marks the run interrupted and cancels whatever is in
/// flight; their `.part` files are removed by the engine.
fn spawn_interrupt_handler(registry: TransferRegistry, interrupt: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
            let signalled = registry.cancel_all();
            warn!(signalled, "Interrupted, cancelling transfers");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn registry(dir: &TempDir) -> TransferRegistry {
        let engine = TransferEngine::new(
            Arc::new(HttpTransport::new().unwrap()),
            Arc::new(LocalFileStore::new()),
            Arc::new(TracingTelemetry::new()),
        );
        TransferRegistry::new(Arc::new(engine)).with_default_dir(dir.path())
    }

    #[tokio::test]
    async fn test_start_all_skips_everything_after_interrupt() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let reporter = ProgressReporter::new(ProgressMode::Silent);
        let interrupt = CancellationToken::new();
        interrupt.cancel();

        let urls = vec![
            "https://example.invalid/a.pdf".to_string(),
            "https://example.invalid/b.pdf".to_string(),
        ];
        let (running, stats) = start_all(&registry, &reporter, &urls, &interrupt).await;

        assert!(running.is_empty());
        assert_eq!(
            stats,
            RunStats {
                completed: 0,
                cancelled: 2,
                failed: 0
            }
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_start_all_cancels_start_that_straddles_interrupt() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/first.bin"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/first.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8; 4096]))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/second.bin"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let reporter = ProgressReporter::new(ProgressMode::Silent);
        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let urls = vec![
            format!("{}/first.bin", server.uri()),
            format!("{}/second.bin", server.uri()),
        ];
        let (running, stats) = start_all(&registry, &reporter, &urls, &interrupt).await;

        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(running.len(), 1);
        let (handle, _tracked) = running.into_iter().next().unwrap();
        assert_eq!(handle.wait().await.unwrap(), TransferOutcome::Cancelled);
        assert!(!dir.path().join("first.bin").exists());
        assert!(!dir.path().join("first.bin.part").exists());
    }
}
