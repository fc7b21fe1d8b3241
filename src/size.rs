//! Human-readable byte counts for progress display.

/// Unit labels, 1024-based.
const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Formats a byte count using the largest unit that keeps the value >= 1.
///
/// Values under 1 KiB are rendered as whole bytes (`"512 B"`); everything
/// else gets two decimals (`"1.50 KB"`, `"3.00 GB"`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{size:.2} {}", UNITS[unit_index])
}
