//! Error types for browser driver operations

/// Failure reported by a [`BrowserDriver`](super::BrowserDriver) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Handle belongs to a page that has since been navigated away from or
    /// re-rendered
    #[error("stale element reference")]
    StaleElement,

    /// Element exists but has not rendered content yet
    #[error("element not rendered yet")]
    NotRendered,

    /// Operation did not finish within its bound
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// Navigation to a URL failed outright
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Driver cannot evaluate this selector or action
    #[error("unsupported by this driver: {0}")]
    Unsupported(String),

    /// Browser connection is gone
    #[error("browser disconnected: {0}")]
    Disconnected(String),

    /// Any other protocol-level failure
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Failures that usually resolve on their own (re-render, slow load).
    ///
    /// The locator treats these as "zero matches" for a strategy instead of
    /// escalating them.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement | Self::NotRendered | Self::Timeout { .. }
        )
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Classify a free-form protocol error message.
    ///
    /// CDP reports most failures as strings, so classification goes by
    /// message content the same way page failures are categorized for retry.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();

        if msg.contains("timeout") || msg.contains("timed out") {
            return Self::Timeout {
                operation: "browser request".to_string(),
                after_ms: 0,
            };
        }

        if msg.contains("no node")
            || msg.contains("could not find node")
            || msg.contains("stale")
            || msg.contains("detached")
            || msg.contains("cannot find context")
        {
            return Self::StaleElement;
        }

        if msg.contains("not visible")
            || msg.contains("does not have a layout")
            || msg.contains("not rendered")
        {
            return Self::NotRendered;
        }

        if msg.contains("connection") || msg.contains("websocket") || msg.contains("closed") {
            return Self::Disconnected(message.to_string());
        }

        Self::Protocol(message.to_string())
    }
}

/// Convenience alias for driver results
pub type DriverResult<T> = Result<T, DriverError>;
