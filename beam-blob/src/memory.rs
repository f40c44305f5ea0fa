use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::store::validate_key;
use crate::{collect_stream, BlobError, BlobResult, BlobStore, ByteStream, GetResult, PutResult};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
}

/// In-memory blob store for tests and development.
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
    failing_deletes: Arc<RwLock<HashSet<String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove a blob behind the owner's back, as an operator or disk fault would.
    pub fn remove_out_of_band(&self, key: &str) -> bool {
        self.blobs.write().remove(key).is_some()
    }

    /// Make every `delete` of `key` fail with a backend error.
    pub fn fail_deletes_for(&self, key: &str) {
        self.failing_deletes.write().insert(key.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        _content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        validate_key(key)?;
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;

        self.blobs.write().insert(
            key.to_string(),
            StoredBlob { data },
        );
        Ok(PutResult { size_bytes })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let blob = self
            .blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        let size_bytes = blob.data.len() as u64;
        Ok(GetResult {
            stream: crate::stream_from_bytes(blob.data),
            size_bytes,
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        if self.failing_deletes.read().contains(key) {
            return Err(BlobError::backend(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("blob '{}' is locked", key),
            )));
        }
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::not_found(key))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
