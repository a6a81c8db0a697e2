//! Utility module for common functionality

use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns that must never reach the log, with their replacements
static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer [A-Za-z0-9\-_.]+", "Bearer [REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_]+", "api_key=[REDACTED]"),
        (r"(?i)x-goog-api-key[=:]\s*[A-Za-z0-9\-_]+", "x-goog-api-key=[REDACTED]"),
        (r"sk-[A-Za-z0-9\-_]{8,}", "sk-[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Truncate a string to at most `max_chars` characters, adding an ellipsis if truncated
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let head: String = s.chars().take(max_chars - 3).collect();
    format!("{}...", head)
}

/// Sanitize a string for logging (remove credentials)
pub fn sanitize_for_logging(s: &str) -> String {
    SENSITIVE_PATTERNS
        .iter()
        .fold(s.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Generate a unique run ID
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string_is_char_safe() {
        assert_eq!(truncate_string("corto", 10), "corto");
        assert_eq!(truncate_string("atención al usuario", 8), "atenc...");
        assert_eq!(truncate_string("ñandú", 2), "ña");
    }

    #[test]
    fn test_sanitize_for_logging() {
        let line = "401: Incorrect API key provided: sk-abcdef123456 (Bearer abc.def)";
        let clean = sanitize_for_logging(line);
        assert!(!clean.contains("abcdef123456"));
        assert!(clean.contains("Bearer [REDACTED]"));

        assert_eq!(sanitize_for_logging("api_key=XYZ"), "api_key=[REDACTED]");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(generate_run_id(), generate_run_id());
    }
}
