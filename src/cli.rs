//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Smallest accepted `--chunk-size`.
pub const MIN_CHUNK_SIZE: u64 = 512;
/// Largest accepted `--chunk-size` (1 MiB).
pub const MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Stream HTTP(S) resources to disk with live progress.
///
/// URLs come from the arguments, or from stdin (one per line) when none are
/// given. Every URL is transferred concurrently; Ctrl-C cancels them all and
/// removes any partial files.
#[derive(Parser, Debug)]
#[command(name = "any-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download (read from stdin when omitted)
    pub urls: Vec<String>,

    /// Directory to save files into [default: ~/Downloads]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit progress and outcome events as JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Read buffer size in bytes (512-1048576)
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE))]
    pub chunk_size: Option<u64>,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (1-3600); unset waits indefinitely
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["any-downloader"]).unwrap();
        assert!(args.urls.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert!(args.output_dir.is_none());
        assert!(args.chunk_size.is_none());
    }

    #[test]
    fn test_cli_positional_urls() {
        let args = Args::try_parse_from([
            "any-downloader",
            "https://example.com/a.pdf",
            "https://example.com/b.pdf",
        ])
        .unwrap();
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.urls[1], "https://example.com/b.pdf");
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["any-downloader", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["any-downloader", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_and_json_flags() {
        let args = Args::try_parse_from(["any-downloader", "-q", "--json"]).unwrap();
        assert!(args.quiet);
        assert!(args.json);
    }

    #[test]
    fn test_cli_output_dir_short_and_long() {
        let args = Args::try_parse_from(["any-downloader", "-o", "/tmp/out"]).unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));

        let args = Args::try_parse_from(["any-downloader", "--output-dir", "dl"]).unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("dl")));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["any-downloader", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["any-downloader", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["any-downloader", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_chunk_size_bounds() {
        let args = Args::try_parse_from(["any-downloader", "--chunk-size", "512"]).unwrap();
        assert_eq!(args.chunk_size, Some(512));
        let args = Args::try_parse_from(["any-downloader", "--chunk-size", "1048576"]).unwrap();
        assert_eq!(args.chunk_size, Some(1_048_576));

        for rejected in ["511", "1048577", "0"] {
            let err = Args::try_parse_from(["any-downloader", "--chunk-size", rejected]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{rejected}");
        }
    }

    #[test]
    fn test_cli_timeouts_reject_zero() {
        let args = Args::try_parse_from([
            "any-downloader",
            "--connect-timeout",
            "5",
            "--read-timeout",
            "60",
        ])
        .unwrap();
        assert_eq!(args.connect_timeout, Some(5));
        assert_eq!(args.read_timeout, Some(60));

        let err = Args::try_parse_from(["any-downloader", "--connect-timeout", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
