//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use std::collections::BTreeMap;
use std::time::Duration;

use super::builder::ExtractionConfigBuilder;
use super::profile::SiteProfile;
use super::types::LazyLoad;
use crate::field_parser::BlockSchema;
use crate::locator::{SemanticTarget, TargetSpec};
use crate::session::SetupAction;

impl<State> ExtractionConfigBuilder<State> {
    /// Replace every target at once.
    #[must_use]
    pub fn targets(mut self, targets: BTreeMap<SemanticTarget, TargetSpec>) -> Self {
        self.settings.targets = targets;
        self
    }

    /// Configure (or reconfigure) one target.
    ///
    /// Leaving [`SemanticTarget::DiscussionLink`] unconfigured selects single
    /// mode, where every page is one discussion.
    #[must_use]
    pub fn target(mut self, target: SemanticTarget, spec: TargetSpec) -> Self {
        self.settings.targets.insert(target, spec);
        self
    }

    /// Parse reply containers positionally instead of with per-field targets.
    #[must_use]
    pub fn comment_block(mut self, schema: BlockSchema) -> Self {
        self.settings.comment_block = Some(schema);
        self
    }

    #[must_use]
    pub fn author_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.author_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn min_inter_page_delay(mut self, delay: Duration) -> Self {
        self.settings.min_inter_page_delay = delay;
        self
    }

    /// Take `long_pause` extra every `pages` pages. `0` disables it.
    #[must_use]
    pub fn long_pause(mut self, pages: usize, long_pause: Duration) -> Self {
        self.settings.pages_per_long_pause = pages;
        self.settings.long_pause = long_pause;
        self
    }

    #[must_use]
    pub fn pacing_jitter(mut self, jitter: Duration) -> Self {
        self.settings.pacing_jitter = jitter;
        self
    }

    /// Turn pacing off entirely. Only sensible for offline snapshot runs.
    #[must_use]
    pub fn no_pacing(self) -> Self {
        self.min_inter_page_delay(Duration::ZERO)
            .long_pause(0, Duration::ZERO)
            .pacing_jitter(Duration::ZERO)
    }

    #[must_use]
    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.settings.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn user_agent_override(mut self, user_agent: Option<String>) -> Self {
        self.settings.user_agent_override = user_agent;
        self
    }

    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.settings.navigation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn element_wait_timeout(mut self, timeout: Duration) -> Self {
        self.settings.element_wait_timeout = timeout;
        self
    }

    /// Wait before the single retry of a failed page or discussion.
    #[must_use]
    pub fn page_retry_backoff(mut self, backoff: Duration) -> Self {
        self.settings.page_retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn checkpoint_every_discussions(mut self, every: usize) -> Self {
        self.settings.checkpoint_every_discussions = every;
        self
    }

    #[must_use]
    pub fn lazy_load(mut self, lazy_load: Option<LazyLoad>) -> Self {
        self.settings.lazy_load = lazy_load;
        self
    }

    #[must_use]
    pub fn setup_actions(mut self, actions: Vec<SetupAction>) -> Self {
        self.settings.setup_actions = actions;
        self
    }

    /// Set browser headless mode (visible vs invisible browser window).
    ///
    /// Headed mode is useful while writing a site profile; unattended crawls
    /// should stay headless (the default).
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.settings.headless = headless;
        self
    }

    /// Apply every field a site profile sets. Unset profile fields keep the
    /// builder's current values.
    #[must_use]
    pub fn apply_profile(mut self, profile: &SiteProfile) -> Self {
        let s = &mut self.settings;
        s.targets.extend(profile.targets.iter().map(|(t, spec)| (*t, spec.clone())));
        if let Some(schema) = &profile.comment_block {
            s.comment_block = Some(schema.clone());
        }
        if let Some(prefixes) = &profile.author_prefixes {
            s.author_prefixes.clone_from(prefixes);
        }
        if let Some(ms) = profile.min_inter_page_delay_ms {
            s.min_inter_page_delay = Duration::from_millis(ms);
        }
        if let Some(pages) = profile.pages_per_long_pause {
            s.pages_per_long_pause = pages;
        }
        if let Some(ms) = profile.long_pause_ms {
            s.long_pause = Duration::from_millis(ms);
        }
        if let Some(ms) = profile.pacing_jitter_ms {
            s.pacing_jitter = Duration::from_millis(ms);
        }
        if profile.max_pages.is_some() {
            s.max_pages = profile.max_pages;
        }
        if profile.user_agent.is_some() {
            s.user_agent_override.clone_from(&profile.user_agent);
        }
        if let Some(secs) = profile.navigation_timeout_secs {
            s.navigation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = profile.element_wait_timeout_secs {
            s.element_wait_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = profile.page_retry_backoff_ms {
            s.page_retry_backoff = Duration::from_millis(ms);
        }
        if let Some(every) = profile.checkpoint_every_discussions {
            s.checkpoint_every_discussions = every;
        }
        if profile.lazy_load.is_some() {
            s.lazy_load = profile.lazy_load;
        }
        if !profile.setup_actions.is_empty() {
            s.setup_actions.clone_from(&profile.setup_actions);
        }
        if let Some(headless) = profile.headless {
            s.headless = headless;
        }
        self
    }
}
