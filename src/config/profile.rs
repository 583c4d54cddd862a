//! Site profiles: per-site selectors and tuning as JSON
//!
//! A profile holds everything site-specific so the same binary can crawl any
//! discussion site. Unset fields fall back to the builder defaults.
//!
//! ```json
//! {
//!   "name": "demo forum",
//!   "start_url": "https://forum.example/r/demo/",
//!   "targets": {
//!     "discussion_link": {
//!       "strategies": [{"selector": {"kind": "css", "value": "a[data-click-id=body]"}}],
//!       "value": {"attribute": "href"}
//!     },
//!     "root_post": {"strategies": [{"selector": {"kind": "css", "value": "div[data-test-id=post-content]"}}]}
//!   },
//!   "max_pages": 10
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::LazyLoad;
use crate::field_parser::BlockSchema;
use crate::locator::{SemanticTarget, TargetSpec};
use crate::session::SetupAction;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default)]
    pub targets: BTreeMap<SemanticTarget, TargetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_block: Option<BlockSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_inter_page_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_per_long_pause: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_pause_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing_jitter_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_wait_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_every_discussions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_load: Option<LazyLoad>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_actions: Vec<SetupAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
}

impl SiteProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid site profile JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site profile {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("In {}", path.display()))
    }
}
