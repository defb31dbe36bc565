use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Keep at most the last `max_chars` characters of a diagnostic blob so error
/// messages stay readable when apt or ab dumps pages of output.
pub fn tail(output: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let trimmed = output.trim_end();
    match trimmed.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}
