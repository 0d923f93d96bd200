use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Canonical form used on both sides of every geographic key comparison:
/// uppercase, canonical decomposition with combining marks removed, trimmed.
/// A missing value normalizes to the empty string.
pub fn normalize_text(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    value
        .trim()
        .to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_string()
}
