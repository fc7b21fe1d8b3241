//! Collects URLs from arguments or stdin.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};

/// Returns the URL lines to process.
///
/// Positional arguments win; otherwise piped stdin is read. An interactive
/// stdin with no arguments yields nothing.
pub(crate) fn collect_input(args: &[String]) -> Result<Vec<String>> {
    if !args.is_empty() {
        return Ok(parse_url_lines(&args.join("\n")));
    }
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read URLs from stdin")?;
    Ok(parse_url_lines(&buffer))
}

/// One URL per line; blank lines and `#` comments are skipped.
pub(crate) fn parse_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}
