//! Driver over saved HTML pages
//!
//! `SnapshotDriver` implements [`BrowserDriver`] on top of `scraper` so a
//! site profile can be developed and regression-tested against pages saved
//! from a real browser, without launching one. It keeps the semantics the
//! pipeline relies on:
//!
//! - element text is rendered one line per block-level box, like `innerText`
//! - every navigation starts a new page generation and handles from older
//!   generations fail with [`DriverError::StaleElement`]
//! - clicking an anchor (or anything inside one) follows its `href`
//!
//! Faults can be injected to exercise retry and blocking paths.

use async_trait::async_trait;
use ego_tree::NodeId;
use ego_tree::iter::Edge;
use scraper::{ElementRef, Html, Node};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

use super::errors::{DriverError, DriverResult};
use super::{BrowserDriver, Scope, Selector, WaitCondition};
use crate::utils::{collapse_whitespace, resolve_href};

/// Elements rendered on their own line(s)
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tr",
    "ul",
];

/// Elements whose text never renders
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template", "noscript", "head"];

/// A set of saved pages keyed by absolute URL.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSite {
    pages: HashMap<String, Arc<str>>,
}

impl SnapshotSite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, html: impl AsRef<str>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl AsRef<str>) {
        self.pages.insert(url.into(), Arc::from(html.as_ref()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Load every `.html` file below `root`.
    ///
    /// When `root/manifest.json` exists it maps absolute URLs to file paths
    /// relative to `root`, which is the only way to register URLs with query
    /// strings. Otherwise each file is served at `base_url` joined with its
    /// relative path, and `index.html` also answers for its directory URL.
    pub fn from_dir(root: &Path, base_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut site = Self::new();
        let manifest_path = root.join("manifest.json");

        if manifest_path.exists() {
            let raw = std::fs::read_to_string(&manifest_path)
                .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
            let manifest: HashMap<String, String> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid snapshot manifest {}", manifest_path.display()))?;
            for (url, file) in manifest {
                let path = root.join(&file);
                let html = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read snapshot page {}", path.display()))?;
                site.insert(url, html);
            }
            return Ok(site);
        }

        let base = url::Url::parse(base_url)
            .with_context(|| format!("Invalid snapshot base URL: {base_url}"))?;
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?
            {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let relative = path
                    .strip_prefix(root)
                    .context("Snapshot file outside root")?
                    .to_string_lossy()
                    .replace('\\', "/");
                let html = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read snapshot page {}", path.display()))?;
                let url = base
                    .join(&relative)
                    .with_context(|| format!("Cannot map {relative} onto {base_url}"))?;
                if relative == "index.html" || relative.ends_with("/index.html") {
                    let dir_url = url.join("./").context("Cannot derive directory URL")?;
                    site.insert(String::from(dir_url), &html);
                }
                site.insert(String::from(url), html);
            }
        }
        Ok(site)
    }

    fn lookup(&self, url: &str) -> Option<(String, Arc<str>)> {
        if let Some(html) = self.pages.get(url) {
            return Some((url.to_string(), Arc::clone(html)));
        }
        let without_fragment = url.split('#').next().unwrap_or(url);
        if let Some(html) = self.pages.get(without_fragment) {
            return Some((without_fragment.to_string(), Arc::clone(html)));
        }
        // Trailing-slash variants only; a query string always names a distinct page.
        let alternate = match without_fragment.strip_suffix('/') {
            Some(trimmed) => trimmed.to_string(),
            None => format!("{without_fragment}/"),
        };
        self.pages
            .get(&alternate)
            .map(|html| (alternate, Arc::clone(html)))
    }
}

/// Handle to an element of one snapshot page generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotElement {
    generation: u64,
    node: NodeId,
}

/// Injected failure for exercising error paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The next `times` clicks fail as if intercepted by an overlay
    ClickFails { times: usize },
    /// The next `times` navigations to `url` time out
    NavigationTimeout { url: String, times: usize },
    /// The next `times` lookups with `selector` report a stale reference
    StaleFind { selector: Selector, times: usize },
}

#[derive(Debug, Clone)]
struct LoadedPage {
    url: String,
    html: Arc<str>,
    generation: u64,
}

/// [`BrowserDriver`] over a [`SnapshotSite`].
pub struct SnapshotDriver {
    site: SnapshotSite,
    current: Mutex<Option<LoadedPage>>,
    generation: AtomicU64,
    faults: Mutex<Vec<Fault>>,
    navigations: Mutex<Vec<String>>,
    typed: Mutex<Vec<String>>,
    clicks: AtomicU64,
    scrolled_px: Mutex<i64>,
    user_agent: Option<String>,
}

/// Lock a mutex, recovering the data if a panicking test thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SnapshotDriver {
    #[must_use]
    pub fn new(site: SnapshotSite) -> Self {
        Self {
            site,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            faults: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            clicks: AtomicU64::new(0),
            scrolled_px: Mutex::new(0),
            user_agent: None,
        }
    }

    /// Record a user agent. Snapshots are static, so it only shows up in logs.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn inject(&self, fault: Fault) {
        lock(&self.faults).push(fault);
    }

    /// Every URL successfully navigated to, in order.
    #[must_use]
    pub fn navigation_log(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    #[must_use]
    pub fn click_count(&self) -> u64 {
        self.clicks.load(Ordering::Relaxed)
    }

    /// Text sent through `send_keys`, in order.
    #[must_use]
    pub fn typed_inputs(&self) -> Vec<String> {
        lock(&self.typed).clone()
    }

    #[must_use]
    pub fn scrolled_px(&self) -> i64 {
        *lock(&self.scrolled_px)
    }

    fn take_fault(&self, mut matches: impl FnMut(&Fault) -> bool) -> bool {
        let mut faults = lock(&self.faults);
        let Some(idx) = faults.iter().position(|f| matches(f)) else {
            return false;
        };
        let exhausted = match &mut faults[idx] {
            Fault::ClickFails { times }
            | Fault::NavigationTimeout { times, .. }
            | Fault::StaleFind { times, .. } => {
                *times = times.saturating_sub(1);
                *times == 0
            }
        };
        if exhausted {
            faults.remove(idx);
        }
        true
    }

    fn loaded(&self) -> DriverResult<LoadedPage> {
        lock(&self.current)
            .clone()
            .ok_or_else(|| DriverError::Protocol("no page loaded".to_string()))
    }

    fn navigate_sync(&self, url: &str) -> DriverResult<()> {
        let injected_timeout = self.take_fault(|f| {
            matches!(f, Fault::NavigationTimeout { url: u, times } if u == url && *times > 0)
        });
        if injected_timeout {
            return Err(DriverError::Timeout {
                operation: format!("navigate {url}"),
                after_ms: 0,
            });
        }

        let (resolved, html) = self.site.lookup(url).ok_or_else(|| DriverError::Navigation {
            url: url.to_string(),
            reason: "no snapshot saved for this URL".to_string(),
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(url = %resolved, generation, "snapshot navigation");
        *lock(&self.current) = Some(LoadedPage {
            url: resolved.clone(),
            html,
            generation,
        });
        lock(&self.navigations).push(resolved);
        Ok(())
    }

    fn check_generation(page: &LoadedPage, element: SnapshotElement) -> DriverResult<()> {
        if element.generation == page.generation {
            Ok(())
        } else {
            Err(DriverError::StaleElement)
        }
    }

    fn find_sync(
        &self,
        scope: Option<SnapshotElement>,
        selector: &Selector,
    ) -> DriverResult<Vec<SnapshotElement>> {
        if self.take_fault(|f| matches!(f, Fault::StaleFind { selector: s, times } if s == selector && *times > 0)) {
            return Err(DriverError::StaleElement);
        }

        let page = self.loaded()?;
        if let Some(element) = scope {
            Self::check_generation(&page, element)?;
        }

        let css = selector.as_css().ok_or_else(|| {
            DriverError::Unsupported(format!("{selector}: snapshot pages only evaluate CSS-expressible selectors"))
        })?;
        let compiled = scraper::Selector::parse(&css)
            .map_err(|e| DriverError::Protocol(format!("invalid selector {css:?}: {e:?}")))?;

        let document = Html::parse_document(&page.html);
        let matches: Vec<ElementRef<'_>> = match scope {
            None => document.select(&compiled).collect(),
            Some(element) => {
                let root = element_ref(&document, element.node)?;
                root.select(&compiled)
                    .filter(|candidate| candidate.id() != root.id())
                    .collect()
            }
        };

        let found: Vec<SnapshotElement> = matches
            .into_iter()
            .filter(|candidate| selector.link_text_matches(&render_text(*candidate)))
            .map(|candidate| SnapshotElement {
                generation: page.generation,
                node: candidate.id(),
            })
            .collect();
        trace!(%selector, count = found.len(), "snapshot find");
        Ok(found)
    }

    fn with_element<T>(
        &self,
        element: SnapshotElement,
        read: impl FnOnce(ElementRef<'_>, &LoadedPage) -> T,
    ) -> DriverResult<T> {
        let page = self.loaded()?;
        Self::check_generation(&page, element)?;
        let document = Html::parse_document(&page.html);
        let element_ref = element_ref(&document, element.node)?;
        Ok(read(element_ref, &page))
    }

    /// Returns the URL to follow when the click lands on a link.
    fn click_sync(&self, element: SnapshotElement) -> DriverResult<Option<String>> {
        if self.take_fault(|f| matches!(f, Fault::ClickFails { times } if *times > 0)) {
            return Err(DriverError::Protocol(
                "element click intercepted by another element".to_string(),
            ));
        }
        self.clicks.fetch_add(1, Ordering::Relaxed);

        self.with_element(element, |element_ref, page| {
            let anchor = std::iter::once(element_ref)
                .chain(element_ref.ancestors().filter_map(ElementRef::wrap))
                .find(|candidate| candidate.value().name() == "a")
                .and_then(|a| a.value().attr("href").map(str::to_string));
            anchor.and_then(|href| resolve_href(&page.url, &href))
        })
    }
}

fn element_ref(document: &Html, node: NodeId) -> DriverResult<ElementRef<'_>> {
    document
        .tree
        .get(node)
        .and_then(ElementRef::wrap)
        .ok_or(DriverError::StaleElement)
}

fn is_hidden_text(node: ego_tree::NodeRef<'_, Node>) -> bool {
    node.ancestors().any(|ancestor| {
        ancestor
            .value()
            .as_element()
            .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
    })
}

/// Render an element's text the way a browser's `innerText` lays it out:
/// block-level boxes and `<br>` start new lines, inline whitespace collapses,
/// blank lines disappear.
#[must_use]
pub fn render_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();

    for edge in element.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Text(text) => {
                    if !is_hidden_text(node) {
                        let s: &str = text;
                        raw.push_str(&s.replace(['\n', '\r', '\t'], " "));
                    }
                }
                Node::Element(el) => {
                    if el.name() == "br" || BLOCK_ELEMENTS.contains(&el.name()) {
                        raw.push('\n');
                    } else if el.name() == "td" || el.name() == "th" {
                        raw.push(' ');
                    }
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Some(el) = node.value().as_element()
                    && BLOCK_ELEMENTS.contains(&el.name())
                {
                    raw.push('\n');
                }
            }
        }
    }

    raw.split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl BrowserDriver for SnapshotDriver {
    type Element = SnapshotElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.navigate_sync(url)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.loaded()?.url)
    }

    async fn find(
        &self,
        scope: Scope<'_, Self::Element>,
        selector: &Selector,
    ) -> DriverResult<Vec<Self::Element>> {
        let scope = match scope {
            Scope::Page => None,
            Scope::Within(element) => Some(*element),
        };
        self.find_sync(scope, selector)
    }

    async fn get_text(&self, element: &Self::Element) -> DriverResult<String> {
        self.with_element(*element, |element_ref, _| render_text(element_ref))
    }

    async fn get_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.with_element(*element, |element_ref, _| {
            element_ref.value().attr(name).map(str::to_string)
        })
    }

    async fn click(&self, element: &Self::Element) -> DriverResult<()> {
        match self.click_sync(*element)? {
            Some(target) => self.navigate_sync(&target),
            None => Ok(()),
        }
    }

    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()> {
        self.with_element(*element, |_, _| ())?;
        lock(&self.typed).push(text.to_string());
        Ok(())
    }

    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> DriverResult<Option<Self::Element>> {
        let expired = || DriverError::Timeout {
            operation: "wait_until".to_string(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        // Snapshot pages never change after load, so one evaluation decides.
        match condition {
            WaitCondition::Present(selector) => match self.find_sync(None, selector) {
                Ok(found) => found.into_iter().next().map(Some).ok_or_else(expired),
                Err(e) if e.is_transient() => Err(expired()),
                Err(e) => Err(e),
            },
            WaitCondition::UrlChanged { from } => {
                if self.loaded()?.url == *from {
                    Err(expired())
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn scroll_by(&self, pixels: i64) -> DriverResult<()> {
        self.loaded()?;
        *lock(&self.scrolled_px) += pixels;
        Ok(())
    }
}
