//! Normalized output records

pub mod assembler;

pub use assembler::{AssembleError, AssemblyWarning, RecordAssembler, RecordContext};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_128;

use crate::field_parser::RelativeTime;

/// One post or reply, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Stable across runs for an unchanged document
    pub record_id: String,
    /// Canonical URL of the discussion
    pub discussion_id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub relative_time: RelativeTime,
    /// `relative_time` projected back from `captured_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_approx: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
    pub is_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Container index within the discussion, root = 0
    pub position: usize,
}

/// 128-bit xxh3 of the identifying triple as 32 lowercase hex chars.
///
/// Fields are joined with the ASCII unit separator, which never occurs in
/// rendered page text.
#[must_use]
pub fn record_id(discussion_id: &str, author: &str, position: usize) -> String {
    let key = format!("{discussion_id}\x1f{author}\x1f{position}");
    format!("{:032x}", xxh3_128(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_stable_and_sensitive_to_each_part() {
        let id = record_id("https://f.test/t/1", "alice", 3);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id, record_id("https://f.test/t/1", "alice", 3));
        assert_ne!(id, record_id("https://f.test/t/2", "alice", 3));
        assert_ne!(id, record_id("https://f.test/t/1", "bob", 3));
        assert_ne!(id, record_id("https://f.test/t/1", "alice", 4));
        // separator keeps field boundaries distinct
        assert_ne!(record_id("a", "b1", 2), record_id("a", "b", 12));
    }
}
