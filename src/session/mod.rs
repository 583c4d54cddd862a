//! Extraction session
//!
//! One session walks one crawl: open the start page (running setup actions
//! the first time), then for every page either visit each listed discussion
//! (listing mode) or extract the page itself (single mode), then follow the
//! next-page control until pagination runs out, the page limit is hit, the
//! caller cancels, or the site blocks further progress.
//!
//! Failure granularity is strict. A bad reply container is skipped, a
//! discussion whose root post cannot be read is skipped, a page that cannot
//! be resolved after one retry is skipped. Only store and checkpoint failures
//! stop the session with an error.

mod discussion;
pub mod errors;
pub mod progress;
pub mod report;
pub mod setup;
pub mod state;

pub use errors::SessionError;
pub use progress::{NoOpProgress, ProgressReporter};
pub use report::{SessionReport, SkipKind, SkippedItem, Termination};
pub use setup::{SetupAction, run_setup_actions};
pub use state::CrawlState;

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserDriver, DriverError, Scope, with_timeout};
use crate::config::ExtractionConfig;
use crate::field_parser::AuthorNormalizer;
use crate::locator::SemanticTarget;
use crate::pagination::{Pacer, PaginationDriver, PaginationState};
use crate::store::{CheckpointStore, RecordStore};
use crate::utils::{canonical_discussion_url, page_identity, preview_raw, resolve_href};
use discussion::ItemFailure;

/// Drives one crawl over one browser, one record store and one checkpoint.
pub struct ExtractionSession<D, R, C> {
    config: ExtractionConfig,
    driver: D,
    records: R,
    checkpoints: C,
    pacer: Pacer,
    normalizer: AuthorNormalizer,
    progress: Arc<dyn ProgressReporter>,
    fresh: bool,
}

/// Per-run bookkeeping threaded through the crawl loop.
struct Run {
    state: CrawlState,
    report: SessionReport,
    since_checkpoint: usize,
}

enum PageOutcome {
    Done,
    Cancelled,
}

enum DiscussionOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl<D, R, C> ExtractionSession<D, R, C>
where
    D: BrowserDriver,
    R: RecordStore,
    C: CheckpointStore,
{
    pub fn new(config: ExtractionConfig, driver: D, records: R, checkpoints: C) -> Self {
        let pacer = config.pacer();
        let normalizer = config.author_normalizer();
        Self {
            config,
            driver,
            records,
            checkpoints,
            pacer,
            normalizer,
            progress: Arc::new(NoOpProgress),
            fresh: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the pacer built from the configuration.
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Discard any existing checkpoint instead of resuming from it.
    #[must_use]
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[must_use]
    pub fn records(&self) -> &R {
        &self.records
    }

    #[must_use]
    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    /// Run the crawl until it terminates.
    ///
    /// Resumes from the checkpoint store unless [`fresh`](Self::fresh) was
    /// set. Clean ends clear the checkpoint; cancellation and blocking leave
    /// one behind for the next run.
    pub async fn run(&self, cancel: CancellationToken) -> Result<SessionReport, SessionError> {
        let loaded = if self.fresh {
            self.checkpoints
                .clear()
                .await
                .map_err(SessionError::Checkpoint)?;
            None
        } else {
            self.checkpoints
                .load()
                .await
                .map_err(SessionError::Checkpoint)?
        };

        let resumed = loaded.is_some();
        let state = loaded.unwrap_or_else(|| CrawlState::fresh(self.config.start_url()));
        let mut run = Run {
            report: SessionReport::new(resumed),
            state,
            since_checkpoint: 0,
        };

        info!(
            target: "threadscrape::session",
            start_url = %self.config.start_url(),
            resumed,
            page = run.state.current_page_index,
            visited = run.state.visited_ids.len(),
            listing = self.config.is_listing_mode(),
            "extraction session starting"
        );
        self.progress
            .report_session_started(self.config.start_url(), resumed);

        let termination = self.crawl(&mut run, &cancel).await?;
        self.finish(run, termination).await
    }

    async fn crawl(
        &self,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<Termination, SessionError> {
        let start = run.state.current_page_url.clone();
        if let Err(e) = self.open(&start, cancel).await {
            if cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }
            warn!(
                page = run.state.current_page_index,
                url = %start,
                error = %e,
                "start page unreachable"
            );
            self.fail_page(run, &start, &e.to_string());
            run.report.blocked_reason = Some(format!("start page unreachable: {e}"));
            return Ok(Termination::Blocked);
        }

        if !run.state.setup_done {
            let actions = self.config.setup_actions();
            if let Err(e) =
                run_setup_actions(&self.driver, actions, self.config.element_wait_timeout()).await
            {
                if cancel.is_cancelled() {
                    return Ok(Termination::Cancelled);
                }
                warn!(url = %start, error = %e, "setup actions failed");
                self.fail_page(run, &start, &e.to_string());
                run.report.blocked_reason = Some(format!("setup failed: {e}"));
                return Ok(Termination::Blocked);
            }
            if !actions.is_empty() {
                match self.driver.current_url().await {
                    Ok(landed) => run.state.current_page_url = landed,
                    Err(e) => debug!(error = %e, "could not read url after setup"),
                }
            }
            run.state.setup_done = true;
        }

        let mut pagination =
            PaginationDriver::new(run.state.current_page_index, self.config.navigation_timeout());
        let max_pages = self.config.max_pages();

        loop {
            if cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            let index = run.state.current_page_index;
            if max_pages.is_some_and(|max| index > max) {
                return Ok(Termination::MaxPages);
            }

            let page_url = run.state.current_page_url.clone();
            info!(page = index, url = %page_url, "processing page");
            self.progress.report_page_started(index, &page_url);
            run.report.pages_visited += 1;

            let outcome = if self.config.is_listing_mode() {
                self.process_listing_page(run, cancel).await?
            } else {
                self.process_single_page(run, cancel).await?
            };
            if let PageOutcome::Cancelled = outcome {
                return Ok(Termination::Cancelled);
            }

            if max_pages.is_some_and(|max| index >= max) {
                info!(page = index, "page limit reached");
                return Ok(Termination::MaxPages);
            }

            if let Err(e) = self.return_to(&page_url, cancel).await {
                run.report.blocked_reason = Some(format!("could not return to page {index}: {e}"));
                return Ok(Termination::Blocked);
            }

            match pagination
                .advance(&self.driver, self.config.locator(), &self.pacer, cancel)
                .await
            {
                PaginationState::AtPage { index: next } if next > index => {
                    let url = match self.driver.current_url().await {
                        Ok(url) => url,
                        Err(e) => {
                            run.report.blocked_reason =
                                Some(format!("page {next} url unreadable: {e}"));
                            return Ok(Termination::Blocked);
                        }
                    };
                    run.state.move_to_page(next, url);
                    self.checkpoint(run).await?;
                }
                // pacing wait was cancelled; the loop head sees it
                PaginationState::AtPage { .. } | PaginationState::Advancing { .. } => {}
                PaginationState::Exhausted => return Ok(Termination::Exhausted),
                PaginationState::Blocked => {
                    run.report.blocked_reason = pagination.last_error().map(str::to_owned);
                    return Ok(Termination::Blocked);
                }
            }
        }
    }

    async fn finish(
        &self,
        mut run: Run,
        termination: Termination,
    ) -> Result<SessionReport, SessionError> {
        run.report.termination = termination;
        if termination.is_clean() {
            self.checkpoints
                .clear()
                .await
                .map_err(SessionError::Checkpoint)?;
        } else {
            self.checkpoint(&mut run).await?;
        }

        info!(
            target: "threadscrape::session",
            %termination,
            pages = run.report.pages_visited,
            discussions = run.report.discussions_completed,
            records = run.report.records_written,
            skipped = run.report.skipped.len(),
            "extraction session finished"
        );
        self.progress.report_completed(&run.report);
        Ok(run.report)
    }

    async fn process_listing_page(
        &self,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<PageOutcome, SessionError> {
        let index = run.state.current_page_index;
        let page_url = run.state.current_page_url.clone();

        let links = match self.listing_links(&page_url).await {
            Ok(links) => links,
            Err(first) => {
                warn!(
                    page = index,
                    url = %page_url,
                    error = %first,
                    "listing unresolvable, retrying after backoff"
                );
                if !self.backoff(cancel).await {
                    return Ok(PageOutcome::Cancelled);
                }
                let retried = match self.open(&page_url, cancel).await {
                    Ok(()) => self.listing_links(&page_url).await,
                    Err(e) => Err(e.to_string()),
                };
                match retried {
                    Ok(links) => links,
                    Err(reason) => {
                        self.fail_page(run, &page_url, &reason);
                        return Ok(PageOutcome::Done);
                    }
                }
            }
        };

        info!(page = index, discussions = links.len(), "listing resolved");

        for link in links {
            if cancel.is_cancelled() {
                return Ok(PageOutcome::Cancelled);
            }
            let discussion_id = canonical_discussion_url(&link);
            if run.state.is_visited(&discussion_id) {
                debug!(page = index, discussion = %discussion_id, "already visited");
                continue;
            }
            if !self.pacer.before_discussion(cancel).await {
                return Ok(PageOutcome::Cancelled);
            }
            if let DiscussionOutcome::Cancelled =
                self.visit_discussion(run, &link, &discussion_id, true, cancel).await?
            {
                return Ok(PageOutcome::Cancelled);
            }
        }

        Ok(PageOutcome::Done)
    }

    async fn process_single_page(
        &self,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<PageOutcome, SessionError> {
        let page_url = run.state.current_page_url.clone();
        let discussion_id = page_identity(&page_url);
        if run.state.is_visited(&discussion_id) {
            debug!(page = run.state.current_page_index, discussion = %discussion_id, "already visited");
            return Ok(PageOutcome::Done);
        }

        match self
            .visit_discussion(run, &page_url, &discussion_id, false, cancel)
            .await?
        {
            DiscussionOutcome::Cancelled => Ok(PageOutcome::Cancelled),
            DiscussionOutcome::Completed | DiscussionOutcome::Failed => Ok(PageOutcome::Done),
        }
    }

    /// Discussion links on the current listing page, absolute and deduplicated.
    ///
    /// Placeholder entries (promoted posts without an href) are dropped by
    /// the locator; unresolvable hrefs are dropped here.
    async fn listing_links(&self, page_url: &str) -> Result<Vec<String>, String> {
        let base = self
            .driver
            .current_url()
            .await
            .unwrap_or_else(|_| page_url.to_string());

        let located = self
            .config
            .locator()
            .resolve(&self.driver, SemanticTarget::DiscussionLink, Scope::Page)
            .await
            .map_err(|e| e.to_string())?;

        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(located.len());
        for link in located {
            match resolve_href(&base, &link.value) {
                Some(url) => {
                    if seen.insert(canonical_discussion_url(&url)) {
                        links.push(url);
                    }
                }
                None => debug!(raw = %preview_raw(&link.value), "unresolvable discussion link"),
            }
        }

        if links.is_empty() {
            return Err("no discussion links on page".to_string());
        }
        Ok(links)
    }

    /// Open (when `navigate`), extract, persist and mark one discussion.
    ///
    /// In single mode the discussion is the page, so a failed extraction gets
    /// the page-level retry and, if that fails too, fails the page.
    async fn visit_discussion(
        &self,
        run: &mut Run,
        url: &str,
        discussion_id: &str,
        navigate: bool,
        cancel: &CancellationToken,
    ) -> Result<DiscussionOutcome, SessionError> {
        let page = run.state.current_page_index;
        self.progress.report_discussion_started(discussion_id);

        if navigate && let Err(e) = self.open(url, cancel).await {
            self.fail_discussion(run, discussion_id, ItemFailure::new(format!("navigation failed: {e}")));
            return Ok(DiscussionOutcome::Failed);
        }

        let mut result = self.extract_discussion(discussion_id, page, cancel).await;

        if !navigate && let Err(first) = &result {
            warn!(
                page,
                discussion = %discussion_id,
                error = %first.reason,
                "discussion page unresolvable, retrying after backoff"
            );
            if !self.backoff(cancel).await {
                return Ok(DiscussionOutcome::Cancelled);
            }
            result = match self.open(url, cancel).await {
                Ok(()) => self.extract_discussion(discussion_id, page, cancel).await,
                Err(e) => Err(ItemFailure::new(format!("navigation failed: {e}"))),
            };
        }

        let extracted = match result {
            Ok(extracted) => extracted,
            Err(failure) => {
                if !navigate {
                    run.state.mark_page_failed(url);
                    run.report.failed_pages.push(url.to_string());
                }
                self.fail_discussion(run, discussion_id, failure);
                return Ok(DiscussionOutcome::Failed);
            }
        };

        for item in extracted.skipped {
            self.progress.report_item_skipped(&item);
            run.report.skipped.push(item);
        }
        run.report.warnings.extend(extracted.warnings);

        let written = self
            .records
            .append(&extracted.records)
            .await
            .map_err(SessionError::Store)?;

        run.state.mark_visited(discussion_id, written);
        run.report.records_written += written;
        run.report.discussions_completed += 1;
        run.since_checkpoint += 1;

        info!(
            page,
            discussion = %discussion_id,
            records = extracted.records.len(),
            new = written,
            "discussion extracted"
        );

        if run.since_checkpoint >= self.config.checkpoint_every_discussions() {
            self.checkpoint(run).await?;
        }
        Ok(DiscussionOutcome::Completed)
    }

    fn fail_discussion(&self, run: &mut Run, discussion_id: &str, failure: ItemFailure) {
        let page = run.state.current_page_index;
        warn!(
            page,
            discussion = %discussion_id,
            raw = %failure.raw.as_deref().map(preview_raw).unwrap_or_default(),
            error = %failure.reason,
            "discussion skipped"
        );
        run.state.mark_discussion_failed(discussion_id);
        let item = SkippedItem {
            kind: SkipKind::Discussion,
            page_index: page,
            discussion_id: Some(discussion_id.to_string()),
            position: None,
            reason: failure.reason,
            raw: failure.raw,
        };
        self.progress.report_item_skipped(&item);
        run.report.skipped.push(item);
    }

    fn fail_page(&self, run: &mut Run, page_url: &str, reason: &str) {
        let page = run.state.current_page_index;
        warn!(page, url = %page_url, error = %reason, "page skipped");
        run.state.mark_page_failed(page_url);
        run.report.failed_pages.push(page_url.to_string());
        let item = SkippedItem {
            kind: SkipKind::Page,
            page_index: page,
            discussion_id: None,
            position: None,
            reason: reason.to_string(),
            raw: None,
        };
        self.progress.report_item_skipped(&item);
        run.report.skipped.push(item);
    }

    async fn checkpoint(&self, run: &mut Run) -> Result<(), SessionError> {
        run.state.last_checkpoint_at = Some(Utc::now());
        self.checkpoints
            .save(&run.state)
            .await
            .map_err(SessionError::Checkpoint)?;
        run.since_checkpoint = 0;
        run.report.checkpoints_written += 1;
        debug!(
            page = run.state.current_page_index,
            visited = run.state.visited_ids.len(),
            "checkpoint written"
        );
        self.progress.report_checkpoint_written(&run.state);
        Ok(())
    }

    /// Navigate with one retry after the page backoff.
    async fn open(&self, url: &str, cancel: &CancellationToken) -> Result<(), DriverError> {
        let timeout = self.config.navigation_timeout();
        match with_timeout(self.driver.navigate(url), timeout, "navigate").await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(url, error = %first, "navigation failed, retrying after backoff");
                if !self.backoff(cancel).await {
                    return Err(first);
                }
                with_timeout(self.driver.navigate(url), timeout, "navigate").await
            }
        }
    }

    /// Navigate back to `page_url` unless the browser is already there.
    async fn return_to(&self, page_url: &str, cancel: &CancellationToken) -> Result<(), DriverError> {
        if self.driver.current_url().await.ok().as_deref() == Some(page_url) {
            return Ok(());
        }
        self.open(page_url, cancel).await
    }

    /// Sleep the retry backoff. Returns `false` if cancelled meanwhile.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.config.page_retry_backoff()) => true,
        }
    }
}
