//! Author and body normalization

use crate::utils::constants::DEFAULT_AUTHOR_PREFIXES;

/// Strips site-specific handle markers from author names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorNormalizer {
    prefixes: Vec<String>,
}

impl Default for AuthorNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR_PREFIXES.iter().copied())
    }
}

impl AuthorNormalizer {
    /// Longer prefixes are tried first so `/u/` wins over `u/`.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        Self { prefixes }
    }

    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        normalize_author(raw, &self.prefixes)
    }
}

/// Trim `raw` and remove at most one leading prefix marker.
#[must_use]
pub fn normalize_author<S: AsRef<str>>(raw: &str, prefixes: &[S]) -> String {
    let trimmed = raw.trim();
    prefixes
        .iter()
        .find_map(|p| trimmed.strip_prefix(p.as_ref()))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Join non-empty trimmed fragments with single spaces.
pub fn join_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_prefixes() {
        let n = AuthorNormalizer::default();
        assert_eq!(n.normalize(" u/alice "), "alice");
        assert_eq!(n.normalize("/u/bob"), "bob");
        assert_eq!(n.normalize("@carol"), "carol");
        assert_eq!(n.normalize("dave"), "dave");
        assert_eq!(n.normalize("u/u/eve"), "u/eve");
    }

    #[test]
    fn custom_prefixes() {
        let n = AuthorNormalizer::new(["by "]);
        assert_eq!(n.normalize("by frank"), "frank");
        assert_eq!(n.normalize("u/frank"), "u/frank");
    }

    #[test]
    fn fragments_join_with_single_spaces() {
        assert_eq!(join_fragments(["  Hello", "", "  ", "world. "]), "Hello world.");
        assert_eq!(join_fragments(Vec::<&str>::new()), "");
    }
}
