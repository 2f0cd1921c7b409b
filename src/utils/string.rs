//! String utilities
//!
//! Helpers for log-safe query previews and for checking the table names
//! that get interpolated into SQL statements.

/// Safely truncate a string at a character boundary
///
/// # Example
/// ```
/// use pricing_pipeline::utils::truncate_str;
///
/// assert_eq!(truncate_str("SELECT 1", 6), "SELECT");
/// assert_eq!(truncate_str("SELECT 1", 100), "SELECT 1");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string and append a suffix if it was cut
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}{}", truncate_str(s, max_chars), suffix)
    }
}

/// Collapse runs of whitespace so multi-line SQL fits on one log line
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check that `name` is a plain, optionally schema-qualified SQL identifier
///
/// Accepts `table` or `schema.table` where each part starts with a letter or
/// underscore and continues with ASCII alphanumerics or underscores.
///
/// # Example
/// ```
/// use pricing_pipeline::utils::is_sql_identifier;
///
/// assert!(is_sql_identifier("reporting.daily_table"));
/// assert!(!is_sql_identifier("daily_table; DROP TABLE x"));
/// ```
pub fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }

    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}
