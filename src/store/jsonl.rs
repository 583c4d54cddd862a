//! JSON-lines record store
//!
//! One `ContentRecord` per line, appended and fsynced per batch. Ids already
//! in the file are loaded on open so appends stay idempotent across runs. A
//! torn final line (crash mid-write) is cut off on open so the next append
//! starts on a fresh line; any other unreadable line is corruption.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{RecordStore, StoreError};
use crate::record::ContentRecord;

pub struct JsonlRecordStore {
    path: PathBuf,
    /// Guards the file as well as the id set
    ids: Mutex<HashSet<String>>,
}

impl JsonlRecordStore {
    /// Open (or create on first append) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (existing, tail) = read_records(&path).await?;
        repair_tail(&path, tail).await?;
        let ids: HashSet<String> = existing.into_iter().map(|r| r.record_id).collect();
        debug!(path = %path.display(), records = ids.len(), "opened record store");
        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.lock().await.is_empty()
    }
}

/// State of the bytes after the last newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    /// Last record parsed but its newline never made it to disk
    Unterminated,
    /// Last line is a partial record; `keep` is the length up to it
    Torn { keep: u64 },
}

async fn read_records(path: &Path) -> Result<(Vec<ContentRecord>, Tail), StoreError> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), Tail::Clean)),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    // bytes after the last newline were never confirmed written
    let keep = raw.iter().rposition(|&b| b == b'\n').map_or(0, |at| at + 1);
    let (body, rest) = raw.split_at(keep);
    let mut records = Vec::new();
    let mut line_no = 0;

    for line in body.split(|&b| b == b'\n') {
        line_no += 1;
        if line.trim_ascii().is_empty() {
            continue;
        }
        let record = serde_json::from_slice::<ContentRecord>(line).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: line_no,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    if rest.trim_ascii().is_empty() {
        return Ok((records, Tail::Clean));
    }
    match serde_json::from_slice::<ContentRecord>(rest) {
        Ok(record) => {
            records.push(record);
            Ok((records, Tail::Unterminated))
        }
        Err(e) => {
            debug!(path = %path.display(), line = line_no, error = %e, "torn final line");
            Ok((records, Tail::Torn { keep: keep as u64 }))
        }
    }
}

/// Leave the file ending on a newline so appends never extend a partial line.
async fn repair_tail(path: &Path, tail: Tail) -> Result<(), StoreError> {
    let mut file = match tail {
        Tail::Clean => return Ok(()),
        Tail::Unterminated => {
            let mut file = OpenOptions::new()
                .append(true)
                .open(path)
                .await
                .map_err(|e| StoreError::io(path, e))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| StoreError::io(path, e))?;
            debug!(path = %path.display(), "terminated final record");
            file
        }
        Tail::Torn { keep } => {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(|e| StoreError::io(path, e))?;
            let len = file
                .metadata()
                .await
                .map_err(|e| StoreError::io(path, e))?
                .len();
            file.set_len(keep)
                .await
                .map_err(|e| StoreError::io(path, e))?;
            warn!(
                path = %path.display(),
                dropped_bytes = len.saturating_sub(keep),
                "dropped torn final line"
            );
            file
        }
    };
    file.flush().await.map_err(|e| StoreError::io(path, e))?;
    file.sync_data()
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn append(&self, records: &[ContentRecord]) -> Result<usize, StoreError> {
        let mut ids = self.ids.lock().await;

        let mut buffer = String::new();
        let mut fresh = Vec::new();
        for record in records {
            if ids.contains(&record.record_id) || fresh.contains(&record.record_id.as_str()) {
                continue;
            }
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
            fresh.push(record.record_id.as_str());
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        let written = fresh.len();
        ids.extend(fresh.into_iter().map(str::to_string));
        debug!(path = %self.path.display(), written, "appended records");
        Ok(written)
    }

    async fn read_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        let _guard = self.ids.lock().await;
        read_records(&self.path).await.map(|(records, _)| records)
    }

    async fn contains(&self, record_id: &str) -> bool {
        self.ids.lock().await.contains(record_id)
    }
}
