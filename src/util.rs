use chrono::Utc;

/// Shorten a commit sha to the 7-character form used in run rows,
/// retry keys, and log lines. Shorter inputs pass through unchanged.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Keep at most `max` characters from the front of `s`.
///
/// Character-based, not byte-based, so multi-byte job output is never
/// split mid-codepoint.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep at most `max` characters from the end of `s`.
///
/// Used for externally reported output, where the tail of a log is the
/// part worth keeping.
pub fn tail_chars(s: &str, max: usize) -> &str {
    let total = s.chars().count();
    if total <= max {
        return s;
    }
    match s.char_indices().nth(total - max) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

/// First line of a commit message, with surrounding whitespace removed.
pub fn first_line(message: &str) -> &str {
    message.trim().lines().next().unwrap_or("")
}

/// Current UTC time in the fixed second-precision format stored in run
/// rows and sent in check-run payloads.
pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Current UTC date, used by the daily retention gate.
pub fn utc_today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
