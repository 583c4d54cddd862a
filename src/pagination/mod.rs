//! Pagination state machine
//!
//! ```text
//! AtPage{i} --next control found--> Advancing{i} --url changed--> AtPage{i+1}
//! AtPage{i} --no next control-----> Exhausted
//! Advancing{i} --2 failures in a row--> Blocked
//! ```
//!
//! `Exhausted` is the normal end of a crawl. `Blocked` means the site stopped
//! letting us through (an overlay eats the click, the URL never changes) and
//! is reported to the caller as a terminal failure.

pub mod pacer;

pub use pacer::Pacer;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserDriver, DriverError, Scope, WaitCondition, with_timeout};
use crate::locator::{LocateError, Locator, SemanticTarget};
use crate::utils::constants::MAX_CONSECUTIVE_TRANSITION_FAILURES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaginationState {
    /// On page `index` (1-based)
    AtPage { index: usize },
    /// Transition away from page `from` in flight
    Advancing { from: usize },
    Exhausted,
    Blocked,
}

impl PaginationState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Blocked)
    }
}

/// Drives the next-page control of the current page.
#[derive(Debug)]
pub struct PaginationDriver {
    state: PaginationState,
    consecutive_failures: u32,
    navigation_timeout: Duration,
    last_error: Option<String>,
}

enum Attempt {
    Moved,
    NoNextControl,
    Failed(String),
}

impl PaginationDriver {
    #[must_use]
    pub fn new(start_index: usize, navigation_timeout: Duration) -> Self {
        Self {
            state: PaginationState::AtPage {
                index: start_index.max(1),
            },
            consecutive_failures: 0,
            navigation_timeout,
            last_error: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PaginationState {
        self.state
    }

    /// Why the last transition attempt failed, if it did.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Try to move to the next page.
    ///
    /// Waits out the pacing delay first. A failed transition is retried once
    /// before the driver gives up as `Blocked`. Cancellation during the pacing
    /// wait leaves the state at `AtPage` unchanged.
    pub async fn advance<D: BrowserDriver>(
        &mut self,
        driver: &D,
        locator: &Locator,
        pacer: &Pacer,
        cancel: &CancellationToken,
    ) -> PaginationState {
        let PaginationState::AtPage { index } = self.state else {
            return self.state;
        };

        if !locator.is_configured(SemanticTarget::NextPage) {
            debug!(page = index, "no next-page target configured");
            self.state = PaginationState::Exhausted;
            return self.state;
        }

        while self.state == (PaginationState::AtPage { index }) {
            if !pacer.before_page(index + 1, cancel).await {
                return self.state;
            }

            self.state = PaginationState::Advancing { from: index };
            match self.attempt(driver, locator).await {
                Attempt::Moved => {
                    self.consecutive_failures = 0;
                    self.last_error = None;
                    self.state = PaginationState::AtPage { index: index + 1 };
                    info!(page = index + 1, "advanced to next page");
                }
                Attempt::NoNextControl => {
                    info!(page = index, "no next-page control, pagination exhausted");
                    self.state = PaginationState::Exhausted;
                }
                Attempt::Failed(reason) => {
                    self.consecutive_failures += 1;
                    warn!(
                        page = index,
                        attempt = self.consecutive_failures,
                        error = %reason,
                        "page transition failed"
                    );
                    self.last_error = Some(reason);
                    self.state = if self.consecutive_failures >= MAX_CONSECUTIVE_TRANSITION_FAILURES {
                        PaginationState::Blocked
                    } else {
                        PaginationState::AtPage { index }
                    };
                }
            }
        }

        self.state
    }

    async fn attempt<D: BrowserDriver>(&self, driver: &D, locator: &Locator) -> Attempt {
        let next = match locator
            .resolve_first(driver, SemanticTarget::NextPage, Scope::Page)
            .await
        {
            Ok(Some(next)) => next,
            Ok(None) | Err(LocateError::NotFound { .. }) => return Attempt::NoNextControl,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let from = match driver.current_url().await {
            Ok(url) => url,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let transition = async {
            driver.click(&next.element).await?;
            driver
                .wait_until(&WaitCondition::UrlChanged { from: from.clone() }, self.navigation_timeout)
                .await?;
            Ok::<(), DriverError>(())
        };

        match with_timeout(transition, self.navigation_timeout, "page transition").await {
            Ok(()) => Attempt::Moved,
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Fault, Selector, SnapshotDriver, SnapshotSite};
    use crate::locator::TargetSpec;
    use std::collections::BTreeMap;

    fn site() -> SnapshotSite {
        SnapshotSite::new()
            .with_page("https://f.test/p/1", r#"<a class="next" href="/p/2">Next</a>"#)
            .with_page("https://f.test/p/2", r#"<a class="next" href="/p/3">Next</a>"#)
            .with_page("https://f.test/p/3", r#"<a class="prev" href="/p/2">Prev</a>"#)
            .with_page("https://f.test/dead", r#"<a class="next" href="/nowhere">Next</a>"#)
    }

    fn locator() -> Locator {
        Locator::new(&BTreeMap::from([(
            SemanticTarget::NextPage,
            TargetSpec::new([Selector::css("a.next")]),
        )]))
        .unwrap()
    }

    async fn start(url: &str) -> SnapshotDriver {
        let driver = SnapshotDriver::new(site());
        driver.navigate(url).await.unwrap();
        driver
    }

    #[tokio::test]
    async fn advances_until_exhausted() {
        let driver = start("https://f.test/p/1").await;
        let cancel = CancellationToken::new();
        let mut pages = PaginationDriver::new(1, Duration::from_secs(1));
        let (loc, pacer) = (locator(), Pacer::disabled());

        assert_eq!(
            pages.advance(&driver, &loc, &pacer, &cancel).await,
            PaginationState::AtPage { index: 2 }
        );
        assert_eq!(driver.current_url().await.unwrap(), "https://f.test/p/2");
        assert_eq!(
            pages.advance(&driver, &loc, &pacer, &cancel).await,
            PaginationState::AtPage { index: 3 }
        );
        assert_eq!(pages.advance(&driver, &loc, &pacer, &cancel).await, PaginationState::Exhausted);
        // terminal states stay put
        assert_eq!(pages.advance(&driver, &loc, &pacer, &cancel).await, PaginationState::Exhausted);
    }

    #[tokio::test]
    async fn one_failure_is_retried() {
        let driver = start("https://f.test/p/1").await;
        driver.inject(Fault::ClickFails { times: 1 });
        let mut pages = PaginationDriver::new(1, Duration::from_secs(1));
        let state = pages
            .advance(&driver, &locator(), &Pacer::disabled(), &CancellationToken::new())
            .await;
        assert_eq!(state, PaginationState::AtPage { index: 2 });
        assert_eq!(driver.click_count(), 1);
    }

    #[tokio::test]
    async fn two_failures_block() {
        let driver = start("https://f.test/p/1").await;
        driver.inject(Fault::ClickFails { times: 2 });
        let mut pages = PaginationDriver::new(1, Duration::from_secs(1));
        let state = pages
            .advance(&driver, &locator(), &Pacer::disabled(), &CancellationToken::new())
            .await;
        assert_eq!(state, PaginationState::Blocked);
        assert!(pages.last_error().unwrap().contains("intercepted"));

        let driver = start("https://f.test/dead").await;
        let mut pages = PaginationDriver::new(4, Duration::from_secs(1));
        let state = pages
            .advance(&driver, &locator(), &Pacer::disabled(), &CancellationToken::new())
            .await;
        assert_eq!(state, PaginationState::Blocked);
    }

    #[tokio::test]
    async fn unconfigured_next_page_means_single_page() {
        let driver = start("https://f.test/p/1").await;
        let mut pages = PaginationDriver::new(1, Duration::from_secs(1));
        let state = pages
            .advance(&driver, &Locator::default(), &Pacer::disabled(), &CancellationToken::new())
            .await;
        assert_eq!(state, PaginationState::Exhausted);
    }

    #[tokio::test]
    async fn cancelled_pacing_keeps_position() {
        let driver = start("https://f.test/p/1").await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut pages = PaginationDriver::new(1, Duration::from_secs(1));
        let state = pages
            .advance(&driver, &locator(), &Pacer::disabled(), &cancel)
            .await;
        assert_eq!(state, PaginationState::AtPage { index: 1 });
        assert_eq!(driver.click_count(), 0);
    }
}
