// Character-based helpers; byte slicing would split multi-byte characters.

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncated prefix with a trailing ellipsis, used for degraded summaries.
pub fn preview(s: &str, max_chars: usize) -> String {
    format!("{}...", truncate_chars(s, max_chars))
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
