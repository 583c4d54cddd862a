//! One-off interactions on the start page
//!
//! Some crawls begin behind a form: type a query into a search box, press
//! enter, wait for results. Setup actions script that once per fresh crawl;
//! a resumed crawl goes straight to the checkpointed page.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::errors::SessionError;
use crate::browser::{BrowserDriver, DriverError, Selector, WaitCondition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SetupAction {
    Click {
        selector: Selector,
    },
    Type {
        selector: Selector,
        text: String,
    },
    PressEnter {
        selector: Selector,
    },
    WaitFor {
        selector: Selector,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

impl SetupAction {
    #[must_use]
    pub fn selector(&self) -> &Selector {
        match self {
            Self::Click { selector }
            | Self::Type { selector, .. }
            | Self::PressEnter { selector }
            | Self::WaitFor { selector, .. } => selector,
        }
    }
}

impl fmt::Display for SetupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { selector } => write!(f, "click {selector}"),
            Self::Type { selector, text } => write!(f, "type {text:?} into {selector}"),
            Self::PressEnter { selector } => write!(f, "press enter in {selector}"),
            Self::WaitFor { selector, .. } => write!(f, "wait for {selector}"),
        }
    }
}

async fn run_one<D: BrowserDriver>(
    driver: &D,
    action: &SetupAction,
    default_timeout: Duration,
) -> Result<(), DriverError> {
    let timeout = match action {
        SetupAction::WaitFor {
            timeout_secs: Some(secs),
            ..
        } => Duration::from_secs(*secs),
        _ => default_timeout,
    };

    let element = driver
        .wait_until(&WaitCondition::Present(action.selector().clone()), timeout)
        .await?
        .ok_or_else(|| DriverError::Protocol(format!("{} matched nothing", action.selector())))?;

    match action {
        SetupAction::Click { .. } => driver.click(&element).await,
        SetupAction::Type { text, .. } => driver.send_keys(&element, text).await,
        SetupAction::PressEnter { .. } => driver.send_keys(&element, "\n").await,
        SetupAction::WaitFor { .. } => Ok(()),
    }
}

/// Run `actions` in order, stopping at the first failure.
pub async fn run_setup_actions<D: BrowserDriver>(
    driver: &D,
    actions: &[SetupAction],
    wait_timeout: Duration,
) -> Result<(), SessionError> {
    for (index, action) in actions.iter().enumerate() {
        info!(step = index + 1, %action, "setup action");
        run_one(driver, action, wait_timeout)
            .await
            .map_err(|source| SessionError::Setup {
                index,
                action: action.to_string(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{SnapshotDriver, SnapshotSite};

    const SEARCH: &str = r#"<form><input id="q"><a id="go" href="/results">Search</a></form>"#;

    #[test]
    fn actions_deserialize_from_profile_json() {
        let json = r#"[
            {"action": "type", "selector": {"kind": "id", "value": "q"}, "text": "rust"},
            {"action": "press_enter", "selector": {"kind": "id", "value": "q"}},
            {"action": "wait_for", "selector": {"kind": "css", "value": "div.result"}, "timeout_secs": 20}
        ]"#;
        let actions: Vec<SetupAction> = serde_json::from_str(json).unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].to_string(), "type \"rust\" into id=q");
        assert!(matches!(actions[2], SetupAction::WaitFor { timeout_secs: Some(20), .. }));
    }

    #[tokio::test]
    async fn type_then_click_navigates() {
        let driver = SnapshotDriver::new(
            SnapshotSite::new()
                .with_page("https://f.test/", SEARCH)
                .with_page("https://f.test/results", "<div class=result>r</div>"),
        );
        driver.navigate("https://f.test/").await.unwrap();

        let actions = vec![
            SetupAction::Type {
                selector: Selector::Id("q".into()),
                text: "rust".into(),
            },
            SetupAction::PressEnter {
                selector: Selector::Id("q".into()),
            },
            SetupAction::Click {
                selector: Selector::Id("go".into()),
            },
            SetupAction::WaitFor {
                selector: Selector::css("div.result"),
                timeout_secs: None,
            },
        ];
        run_setup_actions(&driver, &actions, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(driver.typed_inputs(), ["rust", "\n"]);
        assert_eq!(driver.current_url().await.unwrap(), "https://f.test/results");
    }

    #[tokio::test]
    async fn missing_element_fails_with_step_index() {
        let driver = SnapshotDriver::new(SnapshotSite::new().with_page("https://f.test/", SEARCH));
        driver.navigate("https://f.test/").await.unwrap();
        let err = run_setup_actions(
            &driver,
            &[SetupAction::Click {
                selector: Selector::css("button.missing"),
            }],
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::Setup { index: 0, .. }));
    }
}
