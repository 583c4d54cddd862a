//! [`BrowserDriver`] over a live Chromium tab
//!
//! Thin adapter from the driver vocabulary onto `chromiumoxide`. CDP reports
//! failures as free-form errors, so every error passes through
//! [`DriverError::classify`] to recover the stale/timeout/not-rendered kinds
//! the locator and session care about.

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::errors::{DriverError, DriverResult};
use super::page_timeout::with_timeout;
use super::{BrowserDriver, Scope, Selector, WaitCondition};
use crate::utils::constants::WAIT_POLL_INTERVAL_MS;

fn cdp_error(err: &chromiumoxide::error::CdpError) -> DriverError {
    DriverError::classify(&err.to_string())
}

/// Driver bound to one Chromium page.
pub struct ChromiumDriver {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromiumDriver {
    #[must_use]
    pub fn new(page: Page, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }

    /// Override the user agent for every subsequent request from this tab.
    pub async fn set_user_agent(&self, user_agent: &str) -> DriverResult<()> {
        self.page
            .set_user_agent(user_agent)
            .await
            .map(|_| ())
            .map_err(|e| cdp_error(&e))
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn find_css(&self, scope: Scope<'_, Element>, css: &str) -> DriverResult<Vec<Element>> {
        let found = match scope {
            Scope::Page => self.page.find_elements(css).await,
            Scope::Within(element) => element.find_elements(css).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            // chromiumoxide reports "no match" as an error
            Err(e) if e.to_string().to_lowercase().contains("could not find node") => {
                Ok(Vec::new())
            }
            Err(e) => Err(cdp_error(&e)),
        }
    }

    async fn filter_by_link_text(
        &self,
        candidates: Vec<Element>,
        selector: &Selector,
    ) -> DriverResult<Vec<Element>> {
        let mut kept = Vec::with_capacity(candidates.len());
        for element in candidates {
            let text = element
                .inner_text()
                .await
                .map_err(|e| cdp_error(&e))?
                .unwrap_or_default();
            if selector.link_text_matches(&text) {
                kept.push(element);
            }
        }
        Ok(kept)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        debug!(url, "navigating");
        with_timeout(
            async {
                self.page.goto(url).await.map_err(|e| {
                    let classified = cdp_error(&e);
                    if classified.is_timeout() {
                        classified
                    } else {
                        DriverError::Navigation {
                            url: url.to_string(),
                            reason: e.to_string(),
                        }
                    }
                })?;
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| cdp_error(&e))?;
                Ok(())
            },
            self.navigation_timeout,
            "navigate",
        )
        .await
    }

    async fn current_url(&self) -> DriverResult<String> {
        match self.page.url().await {
            Ok(Some(url)) => Ok(url),
            Ok(None) => Ok("about:blank".to_string()),
            Err(e) => Err(cdp_error(&e)),
        }
    }

    async fn find(
        &self,
        scope: Scope<'_, Self::Element>,
        selector: &Selector,
    ) -> DriverResult<Vec<Self::Element>> {
        let found = match (selector, scope) {
            (Selector::XPath(xpath), Scope::Page) => self
                .page
                .find_xpaths(xpath.as_str())
                .await
                .or_else(|e| {
                    if e.to_string().to_lowercase().contains("could not find node") {
                        Ok(Vec::new())
                    } else {
                        Err(cdp_error(&e))
                    }
                })?,
            (Selector::XPath(_), Scope::Within(_)) => {
                return Err(DriverError::Unsupported(format!(
                    "{selector}: XPath lookups below an element"
                )));
            }
            (other, scope) => {
                // as_css is Some for every non-XPath kind
                let css = other.as_css().unwrap_or_default();
                let candidates = self.find_css(scope, &css).await?;
                match other {
                    Selector::LinkText(_) | Selector::PartialLinkText(_) => {
                        self.filter_by_link_text(candidates, other).await?
                    }
                    _ => candidates,
                }
            }
        };
        trace!(%selector, count = found.len(), "chromium find");
        Ok(found)
    }

    async fn get_text(&self, element: &Self::Element) -> DriverResult<String> {
        element
            .inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| cdp_error(&e))
    }

    async fn get_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> DriverResult<Option<String>> {
        element.attribute(name).await.map_err(|e| cdp_error(&e))
    }

    async fn click(&self, element: &Self::Element) -> DriverResult<()> {
        element.click().await.map(|_| ()).map_err(|e| cdp_error(&e))
    }

    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()> {
        let (body, submit) = match text.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (text, false),
        };
        element.click().await.map_err(|e| cdp_error(&e))?;
        if !body.is_empty() {
            element.type_str(body).await.map_err(|e| cdp_error(&e))?;
        }
        if submit {
            element.press_key("Enter").await.map_err(|e| cdp_error(&e))?;
        }
        Ok(())
    }

    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> DriverResult<Option<Self::Element>> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(WAIT_POLL_INTERVAL_MS);

        loop {
            let outcome = match condition {
                WaitCondition::Present(selector) => {
                    match self.find(Scope::Page, selector).await {
                        Ok(found) => found.into_iter().next().map(Some),
                        Err(e) if e.is_transient() => None,
                        Err(e) => return Err(e),
                    }
                }
                WaitCondition::UrlChanged { from } => match self.current_url().await {
                    Ok(url) if url != *from => Some(None),
                    Ok(_) => None,
                    Err(e) if e.is_transient() => None,
                    Err(e) => return Err(e),
                },
            };

            if let Some(found) = outcome {
                trace!(?condition, elapsed = ?start.elapsed(), "wait satisfied");
                return Ok(found);
            }

            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    operation: "wait_until".to_string(),
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn scroll_by(&self, pixels: i64) -> DriverResult<()> {
        let script = format!("window.scrollBy(0, {pixels})");
        self.page
            .evaluate(script.as_str())
            .await
            .map(|_| ())
            .map_err(|e| cdp_error(&e))
    }
}
