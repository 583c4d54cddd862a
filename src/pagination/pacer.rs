//! Request pacing
//!
//! Sites rate-limit clients that move faster than a reader would. Every page
//! transition and every discussion visit waits at least the minimum delay,
//! with a longer breather every few pages and a little random jitter so the
//! cadence is not perfectly regular.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacer {
    min_delay: Duration,
    pages_per_long_pause: usize,
    long_pause: Duration,
    jitter: Duration,
}

impl Pacer {
    #[must_use]
    pub fn new(
        min_delay: Duration,
        pages_per_long_pause: usize,
        long_pause: Duration,
        jitter: Duration,
    ) -> Self {
        Self {
            min_delay,
            pages_per_long_pause,
            long_pause,
            jitter,
        }
    }

    /// No waiting at all. Offline snapshot runs use this.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0, Duration::ZERO, Duration::ZERO)
    }

    /// Deterministic part of the wait before moving to page `index`.
    ///
    /// `pages_per_long_pause == 0` disables the long pause.
    #[must_use]
    pub fn page_delay(&self, index: usize) -> Duration {
        let long = self.pages_per_long_pause > 0 && index > 0 && index % self.pages_per_long_pause == 0;
        if long {
            self.min_delay + self.long_pause
        } else {
            self.min_delay
        }
    }

    /// Deterministic part of the wait before opening a discussion.
    #[must_use]
    pub fn discussion_delay(&self) -> Duration {
        self.min_delay
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Sleep `base` plus jitter. Returns `false` if cancelled while waiting.
    pub async fn pause(&self, base: Duration, cancel: &CancellationToken) -> bool {
        let total = base + self.sample_jitter();
        if total.is_zero() {
            return !cancel.is_cancelled();
        }
        debug!(delay_ms = total.as_millis() as u64, "pacing");
        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(total) => true,
        }
    }

    pub async fn before_page(&self, index: usize, cancel: &CancellationToken) -> bool {
        self.pause(self.page_delay(index), cancel).await
    }

    pub async fn before_discussion(&self, cancel: &CancellationToken) -> bool {
        self.pause(self.discussion_delay(), cancel).await
    }
}
