//! Core configuration types for discussion extraction
//!
//! `ExtractionConfig` is the validated, immutable form. Everything optional
//! lives in `ExtractionSettings`, which the builder fills in and `build()`
//! checks before compiling the locator and block parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::field_parser::{BlockParser, BlockSchema, SchemaError};
use crate::locator::{LocateError, Locator, SemanticTarget, TargetSpec};
use crate::session::SetupAction;
use crate::utils::constants::{
    DEFAULT_AUTHOR_PREFIXES, DEFAULT_CHECKPOINT_EVERY_DISCUSSIONS, DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS,
    DEFAULT_LAZY_LOAD_PAUSE_MS, DEFAULT_LAZY_LOAD_STEP_PX, DEFAULT_LONG_PAUSE_MS,
    DEFAULT_MIN_INTER_PAGE_DELAY_MS, DEFAULT_NAVIGATION_TIMEOUT_SECS, DEFAULT_PACING_JITTER_MS,
    DEFAULT_PAGE_RETRY_BACKOFF_MS, DEFAULT_PAGES_PER_LONG_PAUSE,
};

/// Configuration rejected by `build()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("target '{0}' must be configured")]
    MissingTarget(SemanticTarget),

    #[error(transparent)]
    Targets(#[from] LocateError),

    #[error(transparent)]
    CommentBlock(#[from] SchemaError),

    #[error("invalid start URL {url:?}: {reason}")]
    StartUrl { url: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    Value { field: &'static str, reason: String },
}

/// Scroll-to-load behaviour for pages that render replies lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyLoad {
    pub steps: u32,
    #[serde(default = "default_step_px")]
    pub step_px: i64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

const fn default_step_px() -> i64 {
    DEFAULT_LAZY_LOAD_STEP_PX
}

const fn default_pause_ms() -> u64 {
    DEFAULT_LAZY_LOAD_PAUSE_MS
}

impl LazyLoad {
    #[must_use]
    pub const fn new(steps: u32) -> Self {
        Self {
            steps,
            step_px: DEFAULT_LAZY_LOAD_STEP_PX,
            pause_ms: DEFAULT_LAZY_LOAD_PAUSE_MS,
        }
    }

    #[must_use]
    pub const fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

/// Optional settings with their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub(crate) targets: BTreeMap<SemanticTarget, TargetSpec>,
    pub(crate) comment_block: Option<BlockSchema>,
    pub(crate) author_prefixes: Vec<String>,
    pub(crate) min_inter_page_delay: Duration,
    pub(crate) pages_per_long_pause: usize,
    pub(crate) long_pause: Duration,
    pub(crate) pacing_jitter: Duration,
    pub(crate) max_pages: Option<usize>,
    pub(crate) user_agent_override: Option<String>,
    pub(crate) navigation_timeout: Duration,
    pub(crate) element_wait_timeout: Duration,
    pub(crate) page_retry_backoff: Duration,
    pub(crate) checkpoint_every_discussions: usize,
    pub(crate) lazy_load: Option<LazyLoad>,
    pub(crate) setup_actions: Vec<SetupAction>,
    pub(crate) headless: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            targets: BTreeMap::new(),
            comment_block: None,
            author_prefixes: DEFAULT_AUTHOR_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            min_inter_page_delay: Duration::from_millis(DEFAULT_MIN_INTER_PAGE_DELAY_MS),
            pages_per_long_pause: DEFAULT_PAGES_PER_LONG_PAUSE,
            long_pause: Duration::from_millis(DEFAULT_LONG_PAUSE_MS),
            pacing_jitter: Duration::from_millis(DEFAULT_PACING_JITTER_MS),
            max_pages: None,
            user_agent_override: None,
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            element_wait_timeout: Duration::from_secs(DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS),
            page_retry_backoff: Duration::from_millis(DEFAULT_PAGE_RETRY_BACKOFF_MS),
            checkpoint_every_discussions: DEFAULT_CHECKPOINT_EVERY_DISCUSSIONS,
            lazy_load: None,
            setup_actions: Vec::new(),
            headless: true,
        }
    }
}

/// Validated configuration of one extraction session.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Records and checkpoint live here. Always absolute.
    pub(crate) storage_dir: PathBuf,
    pub(crate) start_url: String,
    pub(crate) settings: ExtractionSettings,

    /// Compiled from `settings.targets` at build time
    pub(crate) locator: Locator,

    /// Compiled from `settings.comment_block` at build time
    pub(crate) comment_parser: Option<BlockParser>,
}
