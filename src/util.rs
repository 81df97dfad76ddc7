//! Shared utility functions

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let truncated: String = s.chars().take(keep).collect();
    format!("{}...", truncated)
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
