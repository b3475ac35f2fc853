//! Helpers for presentation-format domain names.
//!
//! Names travel through the checker in fully-qualified form (`example.com.`);
//! the root is the empty string once every label has been stripped.

/// Normalize to lowercase fully-qualified form with exactly one trailing dot.
pub fn fqdn(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return ".".to_string();
    }
    format!("{}.", trimmed.to_ascii_lowercase())
}

/// Drop the leftmost label: `www.example.com.` -> `example.com.` -> `com.` -> ``.
///
/// A name without any dot has no parent and yields the empty string.
pub fn strip_leftmost_label(name: &str) -> &str {
    match name.find('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// Number of non-empty labels (`com.` = 1, `.` = 0)
pub fn label_count(name: &str) -> usize {
    name.split('.').filter(|l| !l.is_empty()).count()
}
