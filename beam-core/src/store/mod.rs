//! Record store contract.
//!
//! The record store is the only synchronization point between uploads,
//! downloads, burns and sweeps. Its unique key on `code` is what makes
//! code allocation safe; deletion keyed by `(code, storage_path)` is what
//! makes every cleanup path idempotent.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::record::{Code, FileRecord};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another live record already holds this code.
    #[error("code already in use: {0}")]
    DuplicateCode(String),

    #[error("record store backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(err),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with [`StoreError::DuplicateCode`] when a record with the same
    /// code already exists. Implementations must enforce this atomically.
    async fn insert(&self, record: &FileRecord) -> StoreResult<()>;

    /// Fetch a record by code, expired or not.
    async fn get(&self, code: &Code) -> StoreResult<Option<FileRecord>>;

    /// Delete `record` if it is still the one stored under its code.
    ///
    /// Returns `false` when the record is already gone or the code now
    /// belongs to a newer upload. Never an error for a missing row.
    async fn delete(&self, record: &FileRecord) -> StoreResult<bool>;

    /// All records with `expires_at` strictly before `now`.
    async fn expired_before(&self, now: DateTime<Utc>) -> StoreResult<Vec<FileRecord>>;

    async fn len(&self) -> StoreResult<usize>;

    fn kind(&self) -> &'static str;
}
