//! Persistence for records and checkpoints
//!
//! Both stores are traits so a session can run against disk in production and
//! against memory in tests. Record appends are idempotent on `record_id`,
//! which is what makes re-running a crawl over the same pages safe.

pub mod checkpoint;
pub mod jsonl;
pub mod memory;

pub use checkpoint::JsonCheckpointStore;
pub use jsonl::JsonlRecordStore;
pub use memory::{MemoryCheckpointStore, MemoryRecordStore};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::record::ContentRecord;
use crate::session::CrawlState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{} is corrupt at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Append-only record sink keyed by `record_id`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist records whose id is not stored yet.
    ///
    /// Returns how many were newly written. Duplicates, including duplicates
    /// within `records`, are skipped silently.
    async fn append(&self, records: &[ContentRecord]) -> Result<usize, StoreError>;

    /// Every stored record in append order.
    async fn read_all(&self) -> Result<Vec<ContentRecord>, StoreError>;

    async fn contains(&self, record_id: &str) -> bool;
}

/// Holder of the single latest [`CrawlState`].
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Option<CrawlState>, StoreError>;

    async fn save(&self, state: &CrawlState) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
