//! URL helpers for link resolution and discussion identity.

use url::Url;

/// Resolve an `href` found on `base_url` into an absolute URL string.
///
/// Returns `None` when either side fails to parse, which callers treat the
/// same way as a placeholder link.
#[must_use]
pub fn resolve_href(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join(href.trim()).ok().map(String::from)
}

/// Canonical form of a discussion URL, used as the discussion id.
///
/// Fragments never identify a different discussion, and tracking query
/// parameters differ between visits, so both are dropped. A trailing slash is
/// trimmed so `/comments/a1` and `/comments/a1/` collapse.
#[must_use]
pub fn canonical_discussion_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.set_query(None);
            let mut s = String::from(parsed);
            if s.ends_with('/') && s.matches('/').count() > 3 {
                s.pop();
            }
            s
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Identity of a page that is itself a discussion.
///
/// Unlike [`canonical_discussion_url`] the query is kept: on paged threads it
/// is usually what tells page 2 from page 1.
#[must_use]
pub fn page_identity(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.trim().to_string(),
    }
}
