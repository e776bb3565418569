// ABOUTME: Small helpers shared across modules
// ABOUTME: Environment lookup with CI input fallback and UTF-8 safe truncation

use std::env;

/// Reads `key`, then `INPUT_<key>` (how CI actions pass inputs), skipping empty values.
pub fn env_var(key: &str) -> Option<String> {
    [key.to_string(), format!("INPUT_{}", key)]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .find(|v| !v.is_empty())
}

pub fn env_var_or(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    // Find a valid UTF-8 boundary at or before max_chars
    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}
