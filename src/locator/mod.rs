//! Strategy-driven element location
//!
//! A [`Locator`] turns a [`SemanticTarget`] into elements by trying the
//! target's configured strategies in order. The first strategy that yields at
//! least one usable match wins; later strategies are never consulted once an
//! earlier one matched. Transient driver failures for a strategy count as
//! "no match" so a fallback can still succeed.

pub mod errors;
pub mod strategy;

pub use errors::LocateError;
pub use strategy::{LocatorStrategy, SemanticTarget, TargetSpec, TextPredicate, ValueSource};

use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::browser::{BrowserDriver, DriverError, Scope, Selector};
use crate::field_parser::join_fragments;
use crate::utils::{is_null_like, preview_raw};
use strategy::CompiledPredicate;

/// One usable match.
#[derive(Debug, Clone)]
pub struct Located<E> {
    pub element: E,
    /// Raw value selected by the target's [`ValueSource`]
    pub value: String,
    /// Index of the strategy that produced this match
    pub strategy_index: usize,
}

#[derive(Debug, Clone)]
struct CompiledStrategy {
    strategy: LocatorStrategy,
    predicate: Option<CompiledPredicate>,
}

#[derive(Debug, Clone)]
struct CompiledTarget {
    strategies: Vec<CompiledStrategy>,
    optional: bool,
    value: ValueSource,
}

/// Compiled, read-only view of a profile's targets.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    targets: BTreeMap<SemanticTarget, CompiledTarget>,
}

enum ReadOutcome {
    Usable(String),
    Rejected,
}

impl Locator {
    /// Compile target specs, rejecting empty strategy lists and bad patterns.
    pub fn new(targets: &BTreeMap<SemanticTarget, TargetSpec>) -> Result<Self, LocateError> {
        let mut compiled = BTreeMap::new();

        for (&target, spec) in targets {
            if spec.strategies.is_empty() {
                return Err(LocateError::EmptyStrategies { target });
            }
            let mut strategies = Vec::with_capacity(spec.strategies.len());
            for strategy in &spec.strategies {
                let predicate = strategy
                    .text
                    .as_ref()
                    .map(|p| {
                        CompiledPredicate::compile(p).map_err(|e| LocateError::InvalidPattern {
                            target,
                            pattern: format!("{p:?}"),
                            reason: e.to_string(),
                        })
                    })
                    .transpose()?;
                strategies.push(CompiledStrategy {
                    strategy: strategy.clone(),
                    predicate,
                });
            }
            compiled.insert(
                target,
                CompiledTarget {
                    strategies,
                    optional: spec.optional,
                    value: spec.value.clone(),
                },
            );
        }

        Ok(Self { targets: compiled })
    }

    #[must_use]
    pub fn is_configured(&self, target: SemanticTarget) -> bool {
        self.targets.contains_key(&target)
    }

    #[must_use]
    pub fn is_optional(&self, target: SemanticTarget) -> bool {
        self.targets.get(&target).is_some_and(|t| t.optional)
    }

    /// Selector of the target's first strategy, used for explicit waits.
    #[must_use]
    pub fn primary_selector(&self, target: SemanticTarget) -> Option<&Selector> {
        self.targets
            .get(&target)
            .and_then(|t| t.strategies.first())
            .map(|s| &s.strategy.selector)
    }

    /// All usable matches of `target` under `scope`, in document order.
    pub async fn resolve<D: BrowserDriver>(
        &self,
        driver: &D,
        target: SemanticTarget,
        scope: Scope<'_, D::Element>,
    ) -> Result<Vec<Located<D::Element>>, LocateError> {
        let spec = self
            .targets
            .get(&target)
            .ok_or(LocateError::Unconfigured(target))?;

        for (index, compiled) in spec.strategies.iter().enumerate() {
            let selector = &compiled.strategy.selector;

            let candidates = match driver.find(scope, selector).await {
                Ok(found) => found,
                Err(e) if e.is_transient() => {
                    debug!(%target, %selector, error = %e, "strategy failed transiently, trying next");
                    continue;
                }
                Err(source) => return Err(LocateError::Driver { target, source }),
            };

            let mut usable = Vec::with_capacity(candidates.len());
            for element in candidates {
                match read_value(driver, &element, compiled, &spec.value).await {
                    Ok(ReadOutcome::Usable(value)) => usable.push(Located {
                        element,
                        value,
                        strategy_index: index,
                    }),
                    Ok(ReadOutcome::Rejected) => {}
                    Err(e) if e.is_transient() => {
                        trace!(%target, %selector, error = %e, "match vanished while reading");
                    }
                    Err(source) => return Err(LocateError::Driver { target, source }),
                }
            }

            if !usable.is_empty() {
                trace!(%target, %selector, strategy = index, count = usable.len(), "resolved");
                return Ok(usable);
            }
            trace!(%target, %selector, strategy = index, "no usable match");
        }

        if spec.optional {
            Ok(Vec::new())
        } else {
            Err(LocateError::NotFound {
                target,
                strategies_tried: spec.strategies.len(),
            })
        }
    }

    /// First usable match, `None` only for optional targets.
    pub async fn resolve_first<D: BrowserDriver>(
        &self,
        driver: &D,
        target: SemanticTarget,
        scope: Scope<'_, D::Element>,
    ) -> Result<Option<Located<D::Element>>, LocateError> {
        Ok(self.resolve(driver, target, scope).await?.into_iter().next())
    }

    /// Values of every match joined with single spaces.
    ///
    /// Bodies are often split over several paragraph elements; this folds
    /// them back into one string.
    pub async fn resolve_text<D: BrowserDriver>(
        &self,
        driver: &D,
        target: SemanticTarget,
        scope: Scope<'_, D::Element>,
    ) -> Result<Option<String>, LocateError> {
        let located = self.resolve(driver, target, scope).await?;
        if located.is_empty() {
            return Ok(None);
        }
        Ok(Some(join_fragments(located.iter().map(|l| l.value.as_str()))))
    }
}

async fn read_value<D: BrowserDriver>(
    driver: &D,
    element: &D::Element,
    compiled: &CompiledStrategy,
    source: &ValueSource,
) -> Result<ReadOutcome, DriverError> {
    let text = match (source, &compiled.predicate) {
        (ValueSource::Text, _) | (_, Some(_)) => Some(driver.get_text(element).await?),
        _ => None,
    };

    if let (Some(predicate), Some(text)) = (&compiled.predicate, &text)
        && !predicate.accepts(text)
    {
        return Ok(ReadOutcome::Rejected);
    }

    let value = match source {
        ValueSource::Text => text.unwrap_or_default(),
        ValueSource::Attribute(name) => match driver.get_attribute(element, name).await? {
            Some(value) => value,
            None => return Ok(ReadOutcome::Rejected),
        },
    };

    if is_null_like(&value) {
        trace!(raw = %preview_raw(&value), "dropping null-like match");
        return Ok(ReadOutcome::Rejected);
    }
    Ok(ReadOutcome::Usable(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{Fault, SnapshotDriver, SnapshotSite};

    const LISTING: &str = r#"<html><body>
        <div class="post"><a class="title" href="/t/1">First</a></div>
        <div class="post promoted"><a class="title">Sponsored</a></div>
        <div class="post"><a class="title" href="/t/2">Second</a></div>
        <div class="post"><a class="title" href="null">Broken</a></div>
        <a class="nav" href="/page/2">next ›</a>
    </body></html>"#;

    async fn driver() -> SnapshotDriver {
        let driver = SnapshotDriver::new(SnapshotSite::new().with_page("https://f.test/", LISTING));
        driver.navigate("https://f.test/").await.unwrap();
        driver
    }

    fn locator(target: SemanticTarget, spec: TargetSpec) -> Locator {
        Locator::new(&BTreeMap::from([(target, spec)])).unwrap()
    }

    #[tokio::test]
    async fn first_matching_strategy_wins() {
        let d = driver().await;
        let loc = locator(
            SemanticTarget::DiscussionLink,
            TargetSpec::new([Selector::css("a.missing"), Selector::css("a.title"), Selector::css("a")])
                .attribute("href"),
        );
        let found = loc
            .resolve(&d, SemanticTarget::DiscussionLink, Scope::Page)
            .await
            .unwrap();
        let values: Vec<_> = found.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, ["/t/1", "/t/2"]);
        assert!(found.iter().all(|l| l.strategy_index == 1));
    }

    #[tokio::test]
    async fn transient_failure_falls_through() {
        let d = driver().await;
        d.inject(Fault::StaleFind {
            selector: Selector::css("a.title"),
            times: 1,
        });
        let loc = locator(
            SemanticTarget::Title,
            TargetSpec::new([Selector::css("a.title"), Selector::css("div.post a")]),
        );
        let found = loc.resolve(&d, SemanticTarget::Title, Scope::Page).await.unwrap();
        assert_eq!(found[0].strategy_index, 1);
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn text_predicate_filters_matches() {
        let d = driver().await;
        let loc = locator(
            SemanticTarget::NextPage,
            TargetSpec::new([LocatorStrategy::new(Selector::css("a"))
                .with_text(TextPredicate::Matches("(?i)^next".into()))]),
        );
        let next = loc
            .resolve_first(&d, SemanticTarget::NextPage, Scope::Page)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.value, "next ›");
    }

    #[tokio::test]
    async fn required_vs_optional_empty_results() {
        let d = driver().await;
        let required = locator(SemanticTarget::ExpandThread, TargetSpec::new([Selector::css("button")]));
        assert_eq!(
            required
                .resolve(&d, SemanticTarget::ExpandThread, Scope::Page)
                .await
                .unwrap_err(),
            LocateError::NotFound {
                target: SemanticTarget::ExpandThread,
                strategies_tried: 1
            }
        );

        let optional = locator(
            SemanticTarget::ExpandThread,
            TargetSpec::new([Selector::css("button")]).optional(),
        );
        assert!(
            optional
                .resolve(&d, SemanticTarget::ExpandThread, Scope::Page)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            optional
                .resolve(&d, SemanticTarget::Body, Scope::Page)
                .await
                .unwrap_err(),
            LocateError::Unconfigured(SemanticTarget::Body)
        );
    }

    #[tokio::test]
    async fn non_transient_errors_surface() {
        let d = driver().await;
        let loc = locator(
            SemanticTarget::Title,
            TargetSpec::new([Selector::XPath("//a".into()), Selector::css("a")]),
        );
        let err = loc.resolve(&d, SemanticTarget::Title, Scope::Page).await.unwrap_err();
        assert!(matches!(err.driver_error(), Some(DriverError::Unsupported(_))));
    }

    #[tokio::test]
    async fn resolve_text_joins_fragments() {
        let d = driver().await;
        let loc = locator(SemanticTarget::Body, TargetSpec::new([Selector::css("a.title")]));
        let text = loc
            .resolve_text(&d, SemanticTarget::Body, Scope::Page)
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("First Sponsored Second Broken"));
    }

    #[test]
    fn construction_rejects_bad_configuration() {
        let empty = BTreeMap::from([(SemanticTarget::Body, TargetSpec::new(Vec::<Selector>::new()))]);
        assert!(matches!(
            Locator::new(&empty),
            Err(LocateError::EmptyStrategies { .. })
        ));

        let bad = BTreeMap::from([(
            SemanticTarget::Body,
            TargetSpec::new([LocatorStrategy::new(Selector::css("p"))
                .with_text(TextPredicate::Matches("[".into()))]),
        )]);
        assert!(matches!(
            Locator::new(&bad),
            Err(LocateError::InvalidPattern { .. })
        ));
    }
}
