//! Session-fatal errors
//!
//! Everything below page granularity is handled inside the session and shows
//! up in the report instead. These are the failures that stop a run.

use crate::browser::DriverError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("record store write failed: {0}")]
    Store(#[source] StoreError),

    #[error("checkpoint failed: {0}")]
    Checkpoint(#[source] StoreError),

    #[error("setup action {index} ({action}) failed: {source}")]
    Setup {
        index: usize,
        action: String,
        #[source]
        source: DriverError,
    },
}
