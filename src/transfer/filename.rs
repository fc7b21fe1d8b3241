//! Destination file name derivation from response metadata.
//!
//! Priority: `filename*=` (RFC 5987) → `filename=` → last URL path segment →
//! [`FALLBACK_FILE_NAME`]. A name without an extension gets one inferred
//! from `Content-Type`.

use std::path::{Component, Path};

use url::Url;

use crate::transport::ResponseHead;

/// Name used when neither headers nor URL provide one.
pub const FALLBACK_FILE_NAME: &str = "download";

/// Picks the sanitized destination file name for a response.
#[must_use]
pub fn resolve_file_name(head: &ResponseHead, url: &Url) -> String {
    let name = head
        .content_disposition()
        .and_then(parse_content_disposition)
        .or_else(|| filename_from_url(url))
        .map(|raw| sanitize_filename(&raw))
        .filter(|name| !is_placeholder(name))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

    if has_extension(&name) {
        return name;
    }
    let extension = extension_from_content_type(head.content_type().unwrap_or(""));
    format!("{}{extension}", name.trim_end_matches('.'))
}

/// Maps a media type to a file extension. Parameters and case are ignored.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "application/pdf" => ".pdf",
        "video/mp4" => ".mp4",
        _ => ".bin",
    }
}

/// Parses `Content-Disposition`, preferring the extended `filename*` form.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example%20file.pdf` (RFC 5987)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    extended_disposition_filename(header).or_else(|| basic_disposition_filename(header))
}

/// Extracts and percent-decodes `filename*=charset'lang'value`.
fn extended_disposition_filename(header: &str) -> Option<String> {
    let value = param_value(header, "filename*=")?;
    let value = value.trim_matches('"');
    // Format: charset'language'encoded_value; the language tag may be empty.
    let mut parts = value.splitn(3, '\'');
    let (_charset, _language) = (parts.next()?, parts.next()?);
    let encoded = parts.next()?.trim();
    let decoded = urlencoding::decode(encoded).ok()?;
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// Extracts `filename=value` or `filename="value"`.
fn basic_disposition_filename(header: &str) -> Option<String> {
    let value = param_value(header, "filename=")?;

    // Handle quoted filename
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let name = stripped[..end].trim();
        return (!name.is_empty()).then(|| name.to_string());
    }

    let name = value.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Raw text after `key` up to the next `;` (or the closing quote for quoted
/// values). Matching is case-insensitive.
fn param_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    // ASCII lowercasing keeps byte offsets aligned with `header`.
    let lowered = header.to_ascii_lowercase();
    let mut search_from = 0;
    let start = loop {
        let pos = search_from + lowered[search_from..].find(key)?;
        // Reject matches inside another parameter name, e.g. `xfilename=`.
        let boundary = lowered[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c == ';' || c.is_whitespace());
        if boundary {
            break pos + key.len();
        }
        search_from = pos + key.len();
    };

    let rest = header[start..].trim_start();
    if rest.starts_with('"') {
        let close = rest[1..].find('"').map_or(rest.len(), |i| i + 2);
        return Some(&rest[..close]);
    }
    let end = rest.find(';').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Last non-empty path segment, percent-decoded.
#[must_use]
pub fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last)
        .map_or_else(|_| last.to_string(), std::borrow::Cow::into_owned);
    (!decoded.trim().is_empty()).then_some(decoded)
}

/// Sanitizes a file name for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`; `.` and `..`
/// become underscores so the name can never climb out of its directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Names that carry no information after sanitizing (`_`, `__`, `...`).
fn is_placeholder(name: &str) -> bool {
    name.trim_matches(|c| c == '_' || c == '.').is_empty()
}

fn has_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| !ext.is_empty())
}
