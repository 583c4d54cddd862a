//! In-memory stores
//!
//! Cloning shares the underlying storage, so a test can hand one clone to a
//! session and inspect the other afterwards, or hand the same checkpoint to a
//! second session to simulate a restart.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{CheckpointStore, RecordStore, StoreError};
use crate::record::ContentRecord;
use crate::session::CrawlState;

#[derive(Debug, Default)]
struct Records {
    ids: HashSet<String>,
    records: Vec<ContentRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Records>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(&self, records: &[ContentRecord]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut written = 0;
        for record in records {
            if inner.ids.insert(record.record_id.clone()) {
                inner.records.push(record.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn read_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.inner.lock().await.records.clone())
    }

    async fn contains(&self, record_id: &str) -> bool {
        self.inner.lock().await.ids.contains(record_id)
    }
}

#[derive(Debug, Default)]
struct Checkpoint {
    state: Option<CrawlState>,
    saves: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Checkpoint>>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `save` was called.
    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.saves
    }

    pub async fn current(&self) -> Option<CrawlState> {
        self.inner.lock().await.state.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<CrawlState>, StoreError> {
        Ok(self.inner.lock().await.state.clone())
    }

    async fn save(&self, state: &CrawlState) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.lock().await.state = None;
        Ok(())
    }
}
