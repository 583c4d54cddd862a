//! UTF-8-safe string helpers shared by the parser, the drivers and logging
//!
//! Raw page text routinely contains emoji and other multi-byte characters, so
//! every truncation here respects character boundaries.

use super::constants::MAX_RAW_DISPLAY_CHARS;

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// # Examples
/// ```
/// # use kodegen_tools_threadscrape::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("🎉🎊🎈", 2), "🎉🎊");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Shorten raw page text for log fields and error messages.
///
/// Newlines are made visible so a multi-line comment block stays on one log
/// line.
#[must_use]
pub fn preview_raw(raw: &str) -> String {
    let truncated = safe_truncate_chars(raw, MAX_RAW_DISPLAY_CHARS);
    let mut out = truncated.replace('\n', "\\n");
    if truncated.len() < raw.len() {
        out.push('…');
    }
    out
}

/// Collapse every run of whitespace into a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether an extracted raw value is a placeholder rather than content.
///
/// Advertisement slots and icon-only elements come back as empty strings or
/// as the literal string form of a missing value.
#[must_use]
pub fn is_null_like(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("undefined")
}
