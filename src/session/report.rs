//! Session outcome reporting

use serde::Serialize;
use std::fmt;

use crate::record::AssemblyWarning;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No next-page control: the crawl is complete
    Exhausted,
    /// Configured page limit reached
    MaxPages,
    /// Cancelled by the caller; checkpoint kept for resume
    Cancelled,
    /// Pagination stopped working; checkpoint kept for resume
    Blocked,
}

impl Termination {
    /// Clean ends clear the checkpoint.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Exhausted | Self::MaxPages)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "exhausted",
            Self::MaxPages => "max pages reached",
            Self::Cancelled => "cancelled",
            Self::Blocked => "blocked",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// One reply container
    Item,
    /// A whole discussion (root post unusable or unreachable)
    Discussion,
    /// A whole page (nothing resolvable after a retry)
    Page,
}

/// Something the session gave up on without stopping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub kind: SkipKind,
    pub page_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discussion_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub reason: String,
    /// Offending text, when there was any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub termination: Termination,
    /// Started from a checkpoint
    pub resumed: bool,
    pub pages_visited: usize,
    pub discussions_completed: usize,
    /// Newly written by this run; re-extracted duplicates are not counted
    pub records_written: usize,
    pub checkpoints_written: usize,
    pub skipped: Vec<SkippedItem>,
    pub failed_pages: Vec<String>,
    pub warnings: Vec<AssemblyWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl SessionReport {
    pub(crate) fn new(resumed: bool) -> Self {
        Self {
            termination: Termination::Exhausted,
            resumed,
            pages_visited: 0,
            discussions_completed: 0,
            records_written: 0,
            checkpoints_written: 0,
            skipped: Vec::new(),
            failed_pages: Vec::new(),
            warnings: Vec::new(),
            blocked_reason: None,
        }
    }

    /// Skipped items of one kind.
    pub fn skipped_of(&self, kind: SkipKind) -> impl Iterator<Item = &SkippedItem> {
        self.skipped.iter().filter(move |s| s.kind == kind)
    }
}
