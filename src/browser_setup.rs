//! Chromium discovery, launch and teardown
//!
//! Live extraction needs one Chromium process per session. This module finds
//! a local install (or downloads a managed one), launches it with an isolated
//! profile directory, hands out a [`ChromiumDriver`] for a fresh tab, and
//! tears everything down again.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::browser::ChromiumDriver;
use crate::config::ExtractionConfig;
use crate::utils::constants::CHROME_USER_AGENT;

/// Environment variable that overrides browser discovery.
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

fn candidate_paths() -> Vec<PathBuf> {
    let raw: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    let mut paths: Vec<PathBuf> = raw.iter().map(PathBuf::from).collect();
    if cfg!(target_os = "windows")
        && let Some(local) = dirs::data_local_dir()
    {
        paths.push(local.join(r"Google\Chrome\Application\chrome.exe"));
    }
    if cfg!(target_os = "macos")
        && let Some(home) = dirs::home_dir()
    {
        paths.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
    }
    paths
}

/// Locate a Chrome/Chromium executable.
///
/// Order: `CHROMIUM_PATH`, well-known install locations, then `which` on
/// Unix.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(path = %path.display(), "using browser from {CHROMIUM_PATH_ENV}");
            return Ok(path);
        }
        warn!(path = %path.display(), "{CHROMIUM_PATH_ENV} points to a missing file");
    }

    if let Some(path) = candidate_paths().into_iter().find(|p| p.exists()) {
        info!(path = %path.display(), "found browser");
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!(path = %found, "found browser on PATH");
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory.
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kodegen-threadscrape")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    info!(dir = %cache_dir.display(), "downloading managed Chromium");
    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;
    info!(path = %revision.folder_path.display(), "managed Chromium ready");
    Ok(revision.executable_path)
}

/// A running Chromium plus the task pumping its CDP events.
///
/// Call [`shutdown`](Self::shutdown) when done; dropping only aborts the
/// handler and leaves the profile directory behind.
pub struct ManagedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl ManagedBrowser {
    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    #[must_use]
    pub fn user_data_dir(&self) -> &std::path::Path {
        &self.user_data_dir
    }

    /// Open a blank tab and wrap it as a driver configured from `config`.
    pub async fn open_driver(&self, config: &ExtractionConfig) -> Result<ChromiumDriver> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;
        let driver = ChromiumDriver::new(page, config.navigation_timeout());
        if let Some(user_agent) = config.user_agent_override() {
            driver
                .set_user_agent(user_agent)
                .await
                .context("Failed to apply user agent override")?;
        }
        Ok(driver)
    }

    /// Close the browser, wait for the process and remove the profile.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "failed to wait for browser exit");
        }
        self.handler.abort();
        match std::fs::remove_dir_all(&self.user_data_dir) {
            Ok(()) => debug!(dir = %self.user_data_dir.display(), "browser profile removed"),
            Err(e) => warn!(
                dir = %self.user_data_dir.display(),
                error = %e,
                "failed to remove browser profile"
            ),
        }
    }
}

impl Drop for ManagedBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Find or download Chromium and launch it.
///
/// `user_agent` is passed on the command line so even the first request
/// carries it; [`ManagedBrowser::open_driver`] also applies it per tab.
/// Each launch gets its own profile directory unless `user_data_dir` is
/// given, so concurrent sessions never contend for a profile lock.
pub async fn launch_browser(
    headless: bool,
    user_agent: Option<&str>,
    user_data_dir: Option<PathBuf>,
) -> Result<ManagedBrowser> {
    let chrome_path = match find_browser_executable() {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "no local browser, downloading one");
            download_managed_browser().await?
        }
    };

    let user_data_dir = user_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("kodegen_threadscrape_{}", std::process::id()))
    });
    std::fs::create_dir_all(&user_data_dir).context("Failed to create user data directory")?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    builder = if headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    builder = builder
        .arg(format!("--user-agent={}", user_agent.unwrap_or(CHROME_USER_AGENT)))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--disable-extensions")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!(headless, profile = %user_data_dir.display(), "launching browser");
    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("Failed to launch browser")?;

    let handler = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // chromiumoxide cannot decode every CDP event Chrome emits
                if msg.contains("data did not match any variant of untagged enum Message")
                    || msg.contains("Failed to deserialize WS response")
                {
                    trace!(error = %msg, "ignored undecodable CDP event");
                } else {
                    error!(error = ?e, "browser handler error");
                }
            }
        }
        debug!("browser handler task completed");
    });

    Ok(ManagedBrowser {
        browser,
        handler,
        user_data_dir,
    })
}
