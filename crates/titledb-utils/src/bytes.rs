const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Renders a byte count with binary units and `precision` decimals.
///
/// ```
/// use titledb_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(3 * 512 * 1024, 2), "1.50 MiB");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.precision$} {}", UNITS[unit])
}

/// Throughput such as `1.5 MiB/s`. Non-finite or negative rates show as zero.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let bytes = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec as u64
    } else {
        0
    };
    format!("{}/s", format_bytes(bytes, 1))
}
