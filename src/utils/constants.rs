//! Shared configuration constants for threadscrape
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default minimum delay between page transitions: 1.5 seconds
///
/// Discussion sites flag clients that navigate faster than a person could
/// read. Applied before every pagination step and every discussion visit.
pub const DEFAULT_MIN_INTER_PAGE_DELAY_MS: u64 = 1_500;

/// Take a longer pause every 5 pages
pub const DEFAULT_PAGES_PER_LONG_PAUSE: usize = 5;

/// Length of the periodic long pause: 5 seconds
pub const DEFAULT_LONG_PAUSE_MS: u64 = 5_000;

/// Random jitter added on top of every pacing delay (upper bound)
pub const DEFAULT_PACING_JITTER_MS: u64 = 250;

/// Timeout for `navigate` and for pagination transitions to settle
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Timeout for explicit element waits
pub const DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS: u64 = 10;

/// Backoff before the single retry of a failed page or discussion
pub const DEFAULT_PAGE_RETRY_BACKOFF_MS: u64 = 3_000;

/// Write a checkpoint after this many completed discussions even when the
/// page has not changed yet
pub const DEFAULT_CHECKPOINT_EVERY_DISCUSSIONS: usize = 10;

/// Pagination gives up after this many failed transitions in a row
pub const MAX_CONSECUTIVE_TRANSITION_FAILURES: u32 = 2;

/// Pixels scrolled per lazy-load step
pub const DEFAULT_LAZY_LOAD_STEP_PX: i64 = 1_200;

/// Pause after each lazy-load scroll so new content can render
pub const DEFAULT_LAZY_LOAD_PAUSE_MS: u64 = 750;

/// Poll interval for `wait_until` on live pages
pub const WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Author prefix markers stripped during normalization, checked in order
pub const DEFAULT_AUTHOR_PREFIXES: &[&str] = &["/u/", "u/", "@"];

/// File name of the JSON-lines record store inside the storage directory
pub const RECORDS_FILE_NAME: &str = "records.jsonl";

/// File name of the crawl checkpoint inside the storage directory
pub const CHECKPOINT_FILE_NAME: &str = "checkpoint.json";

/// Raw text longer than this is truncated in log lines and error displays
pub const MAX_RAW_DISPLAY_CHARS: usize = 160;

/// Chrome user agent string used when no override is configured
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
/// Next update: 2025-04-29 (quarterly schedule)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
