//! Resumable crawl progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything needed to pick a crawl back up after a restart.
///
/// Only discussions whose records reached the store are in `visited_ids`, so
/// a crash between extraction and flush re-extracts that discussion instead of
/// losing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    /// 1-based
    pub current_page_index: usize,
    pub current_page_url: String,
    #[serde(default)]
    pub visited_ids: BTreeSet<String>,
    #[serde(default)]
    pub failed_pages: Vec<String>,
    #[serde(default)]
    pub failed_discussions: BTreeSet<String>,
    #[serde(default)]
    pub records_written: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_at: Option<DateTime<Utc>>,
    /// Setup actions already ran for this crawl
    #[serde(default)]
    pub setup_done: bool,
}

impl CrawlState {
    pub fn fresh(start_url: impl Into<String>) -> Self {
        Self {
            current_page_index: 1,
            current_page_url: start_url.into(),
            visited_ids: BTreeSet::new(),
            failed_pages: Vec::new(),
            failed_discussions: BTreeSet::new(),
            records_written: 0,
            last_checkpoint_at: None,
            setup_done: false,
        }
    }

    #[must_use]
    pub fn is_visited(&self, discussion_id: &str) -> bool {
        self.visited_ids.contains(discussion_id)
    }

    /// Record a fully persisted discussion. A later success clears an
    /// earlier failure.
    pub fn mark_visited(&mut self, discussion_id: &str, records_written: usize) {
        self.failed_discussions.remove(discussion_id);
        self.visited_ids.insert(discussion_id.to_string());
        self.records_written += records_written as u64;
    }

    pub fn mark_discussion_failed(&mut self, discussion_id: &str) {
        if !self.visited_ids.contains(discussion_id) {
            self.failed_discussions.insert(discussion_id.to_string());
        }
    }

    pub fn mark_page_failed(&mut self, page_url: &str) {
        if !self.failed_pages.iter().any(|p| p == page_url) {
            self.failed_pages.push(page_url.to_string());
        }
    }

    pub fn move_to_page(&mut self, index: usize, url: impl Into<String>) {
        self.current_page_index = index;
        self.current_page_url = url.into();
    }
}
