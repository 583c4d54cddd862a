//! Progress reporting abstraction for extraction sessions
//!
//! Defines the `ProgressReporter` trait for lifecycle event reporting
//! and provides a no-op implementation for simple use cases.

use super::report::{SessionReport, SkippedItem};
use super::state::CrawlState;
use crate::record::ContentRecord;

/// Trait for reporting session progress at key lifecycle events
///
/// Implementations can send updates to channels, log to console, update UI, etc.
/// The session calls these synchronously, so implementations should not block.
pub trait ProgressReporter: Send + Sync {
    /// Report that the session is starting, fresh or from a checkpoint
    fn report_session_started(&self, start_url: &str, resumed: bool);

    /// Report that work on a page has started
    fn report_page_started(&self, index: usize, url: &str);

    /// Report that a discussion is about to be extracted
    fn report_discussion_started(&self, discussion_id: &str);

    /// Report that a record was assembled (not yet persisted)
    fn report_record_assembled(&self, record: &ContentRecord);

    /// Report an item, discussion or page that was given up on
    fn report_item_skipped(&self, item: &SkippedItem);

    /// Report that a checkpoint was written
    fn report_checkpoint_written(&self, state: &CrawlState);

    /// Report that the session has ended
    fn report_completed(&self, report: &SessionReport);
}

/// Progress reporter that does nothing
///
/// All methods are no-ops and will be inlined away by the compiler.
#[derive(Debug, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_session_started(&self, _start_url: &str, _resumed: bool) {}

    #[inline(always)]
    fn report_page_started(&self, _index: usize, _url: &str) {}

    #[inline(always)]
    fn report_discussion_started(&self, _discussion_id: &str) {}

    #[inline(always)]
    fn report_record_assembled(&self, _record: &ContentRecord) {}

    #[inline(always)]
    fn report_item_skipped(&self, _item: &SkippedItem) {}

    #[inline(always)]
    fn report_checkpoint_written(&self, _state: &CrawlState) {}

    #[inline(always)]
    fn report_completed(&self, _report: &SessionReport) {}
}
