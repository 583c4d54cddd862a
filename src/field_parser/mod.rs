//! Raw text to typed fields
//!
//! Pure functions only. Nothing here touches the browser; callers hand in
//! the strings the locator read.

pub mod block;
pub mod errors;
pub mod normalize;
pub mod relative_time;

pub use block::{BlockAnchor, BlockParser, BlockSchema, FieldRule, LineSlot, parse_block};
pub use errors::{ParseError, ParseErrorKind, SchemaError};
pub use normalize::{AuthorNormalizer, join_fragments, normalize_author};
pub use relative_time::{RelativeTime, TimeUnit, is_relative_time, parse_relative_time};

use std::collections::BTreeMap;

pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_BODY: &str = "body";

/// Typed fields of one post or reply, before record assembly.
///
/// `author` and `body` may still be empty here; the assembler decides
/// whether that is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    pub author: String,
    pub title: Option<String>,
    pub relative_time: RelativeTime,
    pub body: String,
}

impl ParsedFields {
    /// Build typed fields from a raw `author`/`title`/`timestamp`/`body` map.
    pub fn from_raw(
        raw: &BTreeMap<String, String>,
        normalizer: &AuthorNormalizer,
    ) -> Result<Self, ParseError> {
        let timestamp = raw.get(FIELD_TIMESTAMP).ok_or_else(|| {
            ParseError::schema_mismatch(
                format!("{raw:?}"),
                format!("missing field '{FIELD_TIMESTAMP}'"),
            )
        })?;

        Ok(Self {
            author: raw
                .get(FIELD_AUTHOR)
                .map(|a| normalizer.normalize(a))
                .unwrap_or_default(),
            title: raw
                .get(FIELD_TITLE)
                .map(|t| join_fragments(t.lines()))
                .filter(|t| !t.is_empty()),
            relative_time: parse_relative_time(timestamp)?,
            body: raw
                .get(FIELD_BODY)
                .map(|b| join_fragments(b.lines()))
                .unwrap_or_default(),
        })
    }
}
