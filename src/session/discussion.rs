//! Extraction of the discussion currently loaded in the browser

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ExtractionSession;
use super::report::{SkipKind, SkippedItem};
use crate::browser::{BrowserDriver, Scope, WaitCondition, with_timeout};
use crate::field_parser::{FIELD_AUTHOR, FIELD_BODY, FIELD_TIMESTAMP, FIELD_TITLE, ParsedFields};
use crate::locator::{LocateError, Located, SemanticTarget};
use crate::record::{AssemblyWarning, ContentRecord, RecordAssembler, RecordContext};
use crate::store::{CheckpointStore, RecordStore};
use crate::utils::preview_raw;

/// Why a root post or reply could not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemFailure {
    pub reason: String,
    pub raw: Option<String>,
}

impl ItemFailure {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: None,
        }
    }

    fn with_raw(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: Some(raw.into()),
        }
    }
}

impl From<LocateError> for ItemFailure {
    fn from(e: LocateError) -> Self {
        Self::new(e.to_string())
    }
}

/// Records of one discussion, root first, not yet persisted.
#[derive(Debug, Default)]
pub(crate) struct ExtractedDiscussion {
    pub records: Vec<ContentRecord>,
    pub skipped: Vec<SkippedItem>,
    pub warnings: Vec<AssemblyWarning>,
}

impl<D, R, C> ExtractionSession<D, R, C>
where
    D: BrowserDriver,
    R: RecordStore,
    C: CheckpointStore,
{
    /// Extract the discussion on the current page.
    ///
    /// Fails only when the root post cannot be turned into a record. Reply
    /// failures are collected as skipped items.
    pub(crate) async fn extract_discussion(
        &self,
        discussion_id: &str,
        page: usize,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDiscussion, ItemFailure> {
        self.wait_for_root(discussion_id, page).await;
        self.expand_thread(discussion_id, page).await;
        self.lazy_load(discussion_id, cancel).await;

        let locator = self.config.locator();
        let captured_at = Utc::now();
        let mut assembler = RecordAssembler::new(discussion_id);
        let mut extracted = ExtractedDiscussion::default();

        let root = locator
            .resolve_first(&self.driver, SemanticTarget::RootPost, Scope::Page)
            .await?
            .ok_or_else(|| ItemFailure::new("root post not found"))?;
        let raw = self.fields_within(&root.element, true).await?;
        let fields = ParsedFields::from_raw(&raw, &self.normalizer)
            .map_err(|e| ItemFailure::with_raw(e.to_string(), e.raw.clone()))?;
        let record = assembler
            .assemble(fields, RecordContext::root(captured_at), &mut extracted.records)
            .map_err(|e| ItemFailure::new(e.to_string()))?;
        self.progress.report_record_assembled(&record);
        let root_id = record.record_id;

        let comments = match locator
            .resolve(&self.driver, SemanticTarget::Comment, Scope::Page)
            .await
        {
            Ok(comments) => comments,
            Err(LocateError::Unconfigured(_)) => Vec::new(),
            Err(e) if e.is_not_found() => {
                debug!(page, discussion = %discussion_id, "no reply containers");
                Vec::new()
            }
            Err(e) => {
                warn!(page, discussion = %discussion_id, error = %e, "reply containers unresolvable");
                extracted.skipped.push(SkippedItem {
                    kind: SkipKind::Item,
                    page_index: page,
                    discussion_id: Some(discussion_id.to_string()),
                    position: None,
                    reason: e.to_string(),
                    raw: None,
                });
                Vec::new()
            }
        };

        for (i, comment) in comments.iter().enumerate() {
            let position = i + 1;
            match self
                .reply_record(
                    comment,
                    &root_id,
                    position,
                    captured_at,
                    &mut assembler,
                    &mut extracted.records,
                )
                .await
            {
                Ok(record) => self.progress.report_record_assembled(&record),
                Err(failure) => {
                    warn!(
                        page,
                        discussion = %discussion_id,
                        position,
                        raw = %failure.raw.as_deref().map(preview_raw).unwrap_or_default(),
                        error = %failure.reason,
                        "reply skipped"
                    );
                    extracted.skipped.push(SkippedItem {
                        kind: SkipKind::Item,
                        page_index: page,
                        discussion_id: Some(discussion_id.to_string()),
                        position: Some(position),
                        reason: failure.reason,
                        raw: failure.raw,
                    });
                }
            }
        }

        extracted.warnings = assembler.take_warnings();
        Ok(extracted)
    }

    async fn reply_record(
        &self,
        comment: &Located<D::Element>,
        root_id: &str,
        position: usize,
        captured_at: DateTime<Utc>,
        assembler: &mut RecordAssembler,
        pending: &mut Vec<ContentRecord>,
    ) -> Result<ContentRecord, ItemFailure> {
        let raw = match self.config.comment_parser() {
            Some(parser) => parser
                .parse(&comment.value)
                .map_err(|e| ItemFailure::with_raw(e.to_string(), e.raw.clone()))?,
            None => self
                .fields_within(&comment.element, false)
                .await
                .map_err(|f| ItemFailure {
                    raw: Some(comment.value.clone()),
                    ..f
                })?,
        };

        let fields = ParsedFields::from_raw(&raw, &self.normalizer)
            .map_err(|e| ItemFailure::with_raw(e.to_string(), e.raw.clone()))?;
        assembler
            .assemble(
                fields,
                RecordContext::reply(root_id, position, captured_at),
                pending,
            )
            .map_err(|e| ItemFailure::with_raw(e.to_string(), comment.value.clone()))
    }

    /// Raw field map read with per-field locators under `container`.
    ///
    /// Author, timestamp and body are required; the title is read only for
    /// root posts and is allowed to be missing.
    async fn fields_within(
        &self,
        container: &D::Element,
        with_title: bool,
    ) -> Result<BTreeMap<String, String>, ItemFailure> {
        let locator = self.config.locator();
        let scope = Scope::Within(container);
        let mut raw = BTreeMap::new();

        if let Some(author) = locator
            .resolve_first(&self.driver, SemanticTarget::Author, scope)
            .await?
        {
            raw.insert(FIELD_AUTHOR.to_string(), author.value);
        }

        if with_title && locator.is_configured(SemanticTarget::Title) {
            match locator
                .resolve_first(&self.driver, SemanticTarget::Title, scope)
                .await
            {
                Ok(Some(title)) => {
                    raw.insert(FIELD_TITLE.to_string(), title.value);
                }
                Ok(None) => {}
                Err(e) if e.is_not_found() => debug!("root post has no title"),
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(timestamp) = locator
            .resolve_first(&self.driver, SemanticTarget::Timestamp, scope)
            .await?
        {
            raw.insert(FIELD_TIMESTAMP.to_string(), timestamp.value);
        }

        if let Some(body) = locator
            .resolve_text(&self.driver, SemanticTarget::Body, scope)
            .await?
        {
            raw.insert(FIELD_BODY.to_string(), body);
        }

        Ok(raw)
    }

    /// Wait for the root post's first strategy to match.
    ///
    /// The wait is advisory: on expiry the locator still gets to try every
    /// strategy.
    async fn wait_for_root(&self, discussion_id: &str, page: usize) {
        let Some(selector) = self
            .config
            .locator()
            .primary_selector(SemanticTarget::RootPost)
        else {
            return;
        };
        let condition = WaitCondition::Present(selector.clone());
        if let Err(e) = self
            .driver
            .wait_until(&condition, self.config.element_wait_timeout())
            .await
        {
            debug!(page, discussion = %discussion_id, %selector, error = %e, "root post wait expired");
        }
    }

    async fn expand_thread(&self, discussion_id: &str, page: usize) {
        let locator = self.config.locator();
        if !locator.is_configured(SemanticTarget::ExpandThread) {
            return;
        }

        match locator
            .resolve_first(&self.driver, SemanticTarget::ExpandThread, Scope::Page)
            .await
        {
            Ok(Some(control)) => {
                let click = with_timeout(
                    self.driver.click(&control.element),
                    self.config.navigation_timeout(),
                    "click expand control",
                )
                .await;
                match click {
                    Ok(()) => debug!(page, discussion = %discussion_id, "thread expanded"),
                    Err(e) => warn!(
                        page,
                        discussion = %discussion_id,
                        error = %e,
                        "expand control click failed, extracting collapsed thread"
                    ),
                }
            }
            Ok(None) => {}
            Err(e) if e.is_not_found() => {
                debug!(page, discussion = %discussion_id, "no expand control");
            }
            Err(e) => warn!(page, discussion = %discussion_id, error = %e, "expand control unresolvable"),
        }
    }

    /// Scroll in steps so lazily rendered replies load. Stops early on
    /// cancellation; whatever is rendered by then is still extracted.
    async fn lazy_load(&self, discussion_id: &str, cancel: &CancellationToken) {
        let Some(lazy) = self.config.lazy_load() else {
            return;
        };
        for step in 0..lazy.steps {
            if let Err(e) = self.driver.scroll_by(lazy.step_px).await {
                debug!(discussion = %discussion_id, step, error = %e, "lazy-load scroll failed");
                break;
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(discussion = %discussion_id, step, "lazy-load interrupted");
                    break;
                }
                () = tokio::time::sleep(lazy.pause()) => {}
            }
        }
    }
}
