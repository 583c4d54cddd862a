pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{collapse_whitespace, is_null_like, preview_raw, safe_truncate_chars};
pub use url_utils::{canonical_discussion_url, page_identity, resolve_href};
