//! Browser collaborator interface
//!
//! The extraction pipeline never talks to a browser directly. Everything it
//! needs from one (navigation, element lookup, text and attribute reads,
//! clicks, typing, explicit waits, scrolling) goes through [`BrowserDriver`].
//!
//! Two adapters ship with the crate:
//! - [`ChromiumDriver`] drives a live Chromium tab via `chromiumoxide`
//! - [`SnapshotDriver`] serves saved HTML through `scraper`, for offline runs
//!   and tests

pub mod chromium;
pub mod errors;
pub mod page_timeout;
pub mod snapshot;

pub use chromium::ChromiumDriver;
pub use errors::{DriverError, DriverResult};
pub use page_timeout::with_timeout;
pub use snapshot::{Fault, SnapshotDriver, SnapshotElement, SnapshotSite};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A concrete selector understood by a driver.
///
/// Tagged so site profiles can mix selector kinds in one strategy list:
/// `{"kind": "css", "value": "div.comment"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
    Id(String),
    TagName(String),
    /// Anchor whose visible text equals the value
    LinkText(String),
    /// Anchor whose visible text contains the value
    PartialLinkText(String),
}

impl Selector {
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::Css(value.into())
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::TagName(_) => "tag_name",
            Self::LinkText(_) => "link_text",
            Self::PartialLinkText(_) => "partial_link_text",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v)
            | Self::XPath(v)
            | Self::Id(v)
            | Self::TagName(v)
            | Self::LinkText(v)
            | Self::PartialLinkText(v) => v,
        }
    }

    /// CSS equivalent for the kinds that have one.
    ///
    /// Link-text kinds map to `a` and must be filtered by text afterwards.
    #[must_use]
    pub fn as_css(&self) -> Option<String> {
        match self {
            Self::Css(v) | Self::TagName(v) => Some(v.clone()),
            Self::Id(v) => Some(format!("[id=\"{}\"]", v.replace('"', "\\\""))),
            Self::LinkText(_) | Self::PartialLinkText(_) => Some("a".to_string()),
            Self::XPath(_) => None,
        }
    }

    /// Text filter implied by the link-text kinds.
    #[must_use]
    pub fn link_text_matches(&self, text: &str) -> bool {
        let text = text.trim();
        match self {
            Self::LinkText(v) => text == v.trim(),
            Self::PartialLinkText(v) => text.contains(v.trim()),
            _ => true,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind(), self.value())
    }
}

/// Where a lookup runs: the whole page or below one element.
pub enum Scope<'a, E> {
    Page,
    Within(&'a E),
}

impl<E> Clone for Scope<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Scope<'_, E> {}

impl<E> fmt::Debug for Scope<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => f.write_str("Page"),
            Self::Within(_) => f.write_str("Within(..)"),
        }
    }
}

/// Condition for [`BrowserDriver::wait_until`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    /// At least one element matches the selector
    Present(Selector),
    /// The page URL differs from `from`
    UrlChanged { from: String },
}

/// Everything the pipeline needs from a browser.
///
/// Every method may fail; [`DriverError::is_transient`] tells callers which
/// failures are worth treating as "not there yet" rather than as hard errors.
/// Element handles are only valid until the next navigation.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opaque element handle. Never persisted.
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// All matches for `selector` under `scope`, in document order.
    async fn find(
        &self,
        scope: Scope<'_, Self::Element>,
        selector: &Selector,
    ) -> DriverResult<Vec<Self::Element>>;

    /// Rendered text of the element, one line per block-level box.
    async fn get_text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn get_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> DriverResult<Option<String>>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    /// Type `text` into the element. A trailing `\n` submits.
    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    /// Block until `condition` holds or `timeout` expires.
    ///
    /// Returns the first matching element for [`WaitCondition::Present`].
    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> DriverResult<Option<Self::Element>>;

    /// Scroll the viewport vertically, triggering lazy-loaded content.
    async fn scroll_by(&self, pixels: i64) -> DriverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_serde_is_tagged() {
        let json = r#"{"kind":"xpath","value":"//a[@title='Next Page']"}"#;
        let sel: Selector = serde_json::from_str(json).unwrap();
        assert_eq!(sel, Selector::XPath("//a[@title='Next Page']".into()));
        assert_eq!(serde_json::to_string(&sel).unwrap(), json);

        let sel: Selector =
            serde_json::from_str(r#"{"kind":"partial_link_text","value":"Next"}"#).unwrap();
        assert_eq!(sel.as_css().as_deref(), Some("a"));
        assert!(sel.link_text_matches("  Next ›"));
        assert!(!sel.link_text_matches("Previous"));
    }

    #[test]
    fn id_selector_maps_to_attribute_css() {
        assert_eq!(
            Selector::Id("sortType".into()).as_css().as_deref(),
            Some("[id=\"sortType\"]")
        );
        assert_eq!(Selector::XPath("//p".into()).as_css(), None);
    }
}
