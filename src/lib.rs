//! Discussion-thread extraction over a browser driver.
//!
//! A session walks listing or discussion pages through a [`BrowserDriver`],
//! locates content with configurable fallback strategies, parses author,
//! title, relative timestamp and body into typed [`ContentRecord`]s, and
//! persists them idempotently with resumable checkpoints.
//!
//! ```no_run
//! use kodegen_tools_threadscrape::{
//!     ExtractionConfig, ExtractionSession, JsonCheckpointStore, JsonlRecordStore, SiteProfile,
//!     SnapshotDriver, SnapshotSite,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let profile = SiteProfile::load("demos/forum_profile.json".as_ref())?;
//! let config = ExtractionConfig::builder()
//!     .storage_dir("./out")
//!     .start_url("https://forum.example/r/demo/")
//!     .apply_profile(&profile)
//!     .build()?;
//!
//! let site = SnapshotSite::from_dir("./snapshots".as_ref(), config.start_url())?;
//! let records = JsonlRecordStore::open(config.records_path()).await?;
//! let checkpoints = JsonCheckpointStore::new(config.checkpoint_path());
//! let session = ExtractionSession::new(config, SnapshotDriver::new(site), records, checkpoints);
//! let report = session.run(CancellationToken::new()).await?;
//! println!("{} records", report.records_written);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod browser_setup;
pub mod config;
pub mod field_parser;
pub mod locator;
pub mod pagination;
pub mod record;
pub mod session;
pub mod store;
pub mod utils;

pub use browser::{
    BrowserDriver, ChromiumDriver, DriverError, Scope, Selector, SnapshotDriver, SnapshotSite,
    WaitCondition,
};
pub use browser_setup::{ManagedBrowser, launch_browser};
pub use config::{ConfigError, ExtractionConfig, LazyLoad, SiteProfile};
pub use field_parser::{
    BlockSchema, ParseError, ParseErrorKind, RelativeTime, TimeUnit, parse_relative_time,
};
pub use locator::{LocateError, Locator, SemanticTarget, TargetSpec};
pub use pagination::{Pacer, PaginationDriver, PaginationState};
pub use record::ContentRecord;
pub use session::{
    CrawlState, ExtractionSession, NoOpProgress, ProgressReporter, SessionError, SessionReport,
    SetupAction, Termination,
};
pub use store::{
    CheckpointStore, JsonCheckpointStore, JsonlRecordStore, MemoryCheckpointStore,
    MemoryRecordStore, RecordStore, StoreError,
};
