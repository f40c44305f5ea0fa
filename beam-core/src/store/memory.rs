use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{RecordStore, StoreError, StoreResult};
use crate::record::{Code, FileRecord};

/// In-process record store. Clones share the same table.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<HashMap<Code, FileRecord>>>,
    fail_inserts: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with a backend error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, code: &Code) -> bool {
        self.rows.read().contains_key(code)
    }

    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.rows.read().values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &FileRecord) -> StoreResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::backend(std::io::Error::other(
                "insert rejected by memory store",
            )));
        }

        let mut rows = self.rows.write();
        if rows.contains_key(&record.code) {
            return Err(StoreError::DuplicateCode(record.code.to_string()));
        }
        rows.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, code: &Code) -> StoreResult<Option<FileRecord>> {
        Ok(self.rows.read().get(code).cloned())
    }

    async fn delete(&self, record: &FileRecord) -> StoreResult<bool> {
        let mut rows = self.rows.write();
        match rows.get(&record.code) {
            Some(current) if current.storage_path == record.storage_path => {
                rows.remove(&record.code);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expired_before(&self, now: DateTime<Utc>) -> StoreResult<Vec<FileRecord>> {
        let mut expired: Vec<FileRecord> = self
            .rows
            .read()
            .values()
            .filter(|r| r.expires_at < now)
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        Ok(expired)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.rows.read().len())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, path: &str, expires_in_mins: i64) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            code: Code::parse(code),
            original_name: "a.txt".into(),
            size: 1,
            mime_type: "text/plain".into(),
            storage_path: path.into(),
            burn_after_read: false,
            expires_at: now + chrono::Duration::minutes(expires_in_mins),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected() {
        let store = MemoryRecordStore::new();
        store.insert(&record("0001", "a", 10)).await.unwrap();

        let err = store.insert(&record("0001", "b", 10)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode(ref code) if code == "0001"));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_scoped_to_the_blob() {
        let store = MemoryRecordStore::new();
        let old = record("0001", "old", 10);
        store.insert(&old).await.unwrap();

        assert!(store.delete(&old).await.unwrap());
        assert!(!store.delete(&old).await.unwrap());

        let newer = record("0001", "new", 10);
        store.insert(&newer).await.unwrap();
        assert!(!store.delete(&old).await.unwrap());
        assert!(store.contains(&newer.code));
    }

    #[tokio::test]
    async fn expired_query_is_strict() {
        let store = MemoryRecordStore::new();
        store.insert(&record("0001", "a", -5)).await.unwrap();
        store.insert(&record("0002", "b", 5)).await.unwrap();

        let expired = store.expired_before(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].code.as_str(), "0001");
    }
}
