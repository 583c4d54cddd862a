//! Getter methods for `ExtractionConfig`
//!
//! This module provides all the accessor methods for retrieving configuration
//! values from an `ExtractionConfig` instance.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{ExtractionConfig, LazyLoad};
use crate::field_parser::{AuthorNormalizer, BlockParser, BlockSchema};
use crate::locator::{Locator, SemanticTarget};
use crate::pagination::Pacer;
use crate::session::SetupAction;
use crate::utils::constants::{CHECKPOINT_FILE_NAME, RECORDS_FILE_NAME};

impl ExtractionConfig {
    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// `<storage_dir>/records.jsonl`
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.storage_dir.join(RECORDS_FILE_NAME)
    }

    /// `<storage_dir>/checkpoint.json`
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.storage_dir.join(CHECKPOINT_FILE_NAME)
    }

    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Listing mode when discussion links are configured, single mode otherwise.
    #[must_use]
    pub fn is_listing_mode(&self) -> bool {
        self.locator.is_configured(SemanticTarget::DiscussionLink)
    }

    #[must_use]
    pub fn comment_block(&self) -> Option<&BlockSchema> {
        self.settings.comment_block.as_ref()
    }

    #[must_use]
    pub fn comment_parser(&self) -> Option<&BlockParser> {
        self.comment_parser.as_ref()
    }

    #[must_use]
    pub fn author_prefixes(&self) -> &[String] {
        &self.settings.author_prefixes
    }

    #[must_use]
    pub fn author_normalizer(&self) -> AuthorNormalizer {
        AuthorNormalizer::new(self.settings.author_prefixes.iter().cloned())
    }

    #[must_use]
    pub fn pacer(&self) -> Pacer {
        Pacer::new(
            self.settings.min_inter_page_delay,
            self.settings.pages_per_long_pause,
            self.settings.long_pause,
            self.settings.pacing_jitter,
        )
    }

    #[must_use]
    pub fn min_inter_page_delay(&self) -> Duration {
        self.settings.min_inter_page_delay
    }

    #[must_use]
    pub fn pages_per_long_pause(&self) -> usize {
        self.settings.pages_per_long_pause
    }

    #[must_use]
    pub fn long_pause(&self) -> Duration {
        self.settings.long_pause
    }

    #[must_use]
    pub fn pacing_jitter(&self) -> Duration {
        self.settings.pacing_jitter
    }

    #[must_use]
    pub fn max_pages(&self) -> Option<usize> {
        self.settings.max_pages
    }

    #[must_use]
    pub fn user_agent_override(&self) -> Option<&str> {
        self.settings.user_agent_override.as_deref()
    }

    /// Returns the bound for `navigate` calls and pagination transitions.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        self.settings.navigation_timeout
    }

    #[must_use]
    pub fn element_wait_timeout(&self) -> Duration {
        self.settings.element_wait_timeout
    }

    #[must_use]
    pub fn page_retry_backoff(&self) -> Duration {
        self.settings.page_retry_backoff
    }

    #[must_use]
    pub fn checkpoint_every_discussions(&self) -> usize {
        self.settings.checkpoint_every_discussions
    }

    #[must_use]
    pub fn lazy_load(&self) -> Option<LazyLoad> {
        self.settings.lazy_load
    }

    #[must_use]
    pub fn setup_actions(&self) -> &[SetupAction] {
        &self.settings.setup_actions
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.settings.headless
    }
}
