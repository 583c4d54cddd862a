//! Type-safe builder for `ExtractionConfig` using the typestate pattern
//!
//! `storage_dir` and `start_url` must be set, in that order, before `build()`
//! becomes available. Everything else has a default and can be set at any
//! state (see `methods.rs`).

use anyhow::{Context, Result};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{ConfigError, ExtractionConfig, ExtractionSettings};
use crate::field_parser::BlockParser;
use crate::locator::{Locator, SemanticTarget};

// Type states for the builder
pub struct WithStorageDir;
pub struct WithStartUrl;

pub struct ExtractionConfigBuilder<State = ()> {
    pub(crate) storage_dir: Option<PathBuf>,
    pub(crate) start_url: Option<String>,
    pub(crate) settings: ExtractionSettings,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ExtractionConfigBuilder<()> {
    fn default() -> Self {
        Self {
            storage_dir: None,
            start_url: None,
            settings: ExtractionSettings::default(),
            _phantom: PhantomData,
        }
    }
}

impl ExtractionConfig {
    /// Create a builder for configuring an `ExtractionConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ExtractionConfigBuilder<()> {
        ExtractionConfigBuilder::default()
    }
}

impl<State> ExtractionConfigBuilder<State> {
    fn into_state<Next>(self) -> ExtractionConfigBuilder<Next> {
        ExtractionConfigBuilder {
            storage_dir: self.storage_dir,
            start_url: self.start_url,
            settings: self.settings,
            _phantom: PhantomData,
        }
    }
}

impl ExtractionConfigBuilder<()> {
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> ExtractionConfigBuilder<WithStorageDir> {
        let dir = dir.into();
        // Relative paths would silently follow the process cwd on resume
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        self.storage_dir = Some(dir);
        self.into_state()
    }
}

impl ExtractionConfigBuilder<WithStorageDir> {
    pub fn start_url(mut self, url: impl Into<String>) -> ExtractionConfigBuilder<WithStartUrl> {
        let url_string = url.into();

        // Normalize URL: add https:// if no scheme is present
        let normalized_url =
            if url_string.starts_with("http://") || url_string.starts_with("https://") {
                url_string
            } else {
                format!("https://{url_string}")
            };

        self.start_url = Some(normalized_url);
        self.into_state()
    }
}

/// Targets every session needs, whatever the page model.
const REQUIRED_TARGETS: [SemanticTarget; 4] = [
    SemanticTarget::RootPost,
    SemanticTarget::Author,
    SemanticTarget::Timestamp,
    SemanticTarget::Body,
];

// Build method only available when all required fields are set
impl ExtractionConfigBuilder<WithStartUrl> {
    pub fn build(self) -> Result<ExtractionConfig> {
        let storage_dir = self
            .storage_dir
            .context("storage_dir is required")?;
        let start_url = self.start_url.context("start_url is required")?;
        let settings = self.settings;

        url::Url::parse(&start_url).map_err(|e| ConfigError::StartUrl {
            url: start_url.clone(),
            reason: e.to_string(),
        })?;

        if let Some(missing) = REQUIRED_TARGETS
            .into_iter()
            .find(|t| !settings.targets.contains_key(t))
        {
            return Err(ConfigError::MissingTarget(missing).into());
        }

        if settings.max_pages == Some(0) {
            return Err(ConfigError::Value {
                field: "max_pages",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if settings.checkpoint_every_discussions == 0 {
            return Err(ConfigError::Value {
                field: "checkpoint_every_discussions",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if settings.navigation_timeout.is_zero() || settings.element_wait_timeout.is_zero() {
            return Err(ConfigError::Value {
                field: "timeouts",
                reason: "navigation and element wait timeouts must be non-zero".to_string(),
            }
            .into());
        }

        let locator = Locator::new(&settings.targets)
            .map_err(ConfigError::from)
            .context("Invalid target configuration")?;

        let comment_parser = settings
            .comment_block
            .as_ref()
            .map(BlockParser::new)
            .transpose()
            .map_err(ConfigError::from)
            .context("Invalid comment block schema")?;

        Ok(ExtractionConfig {
            storage_dir,
            start_url,
            settings,
            locator,
            comment_parser,
        })
    }
}
