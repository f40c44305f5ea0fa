use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::store::validate_key;
use crate::{BlobConfig, BlobError, BlobResult, BlobStore, ByteStream, GetResult, PutResult};

/// Local file system blob store.
///
/// Writes land in a hidden `.part` file next to the target and are renamed
/// into place after a successful flush, so readers never see a half-written
/// blob under its final name.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
    max_blob_bytes: u64,
    read_chunk_bytes: usize,
}

impl LocalFsStore {
    /// Open the store, creating the root directory if needed.
    pub async fn open(config: BlobConfig) -> BlobResult<Self> {
        fs::create_dir_all(&config.root).await?;
        tracing::debug!(root = %config.root.display(), "local blob store ready");

        Ok(Self {
            root: config.root,
            max_blob_bytes: config.max_blob_bytes,
            read_chunk_bytes: config.read_chunk_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> BlobResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn staging_path(&self, key: &str) -> PathBuf {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.root.join(format!(".{}.{}.part", key, &nonce[..8]))
    }

    async fn write_staged(&self, staging: &Path, mut stream: ByteStream) -> BlobResult<u64> {
        let mut file = fs::File::create(staging).await?;
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_blob_bytes {
                return Err(BlobError::TooLarge {
                    max: self.max_blob_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

fn map_missing(err: std::io::Error, key: &str) -> BlobError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BlobError::not_found(key)
    } else {
        BlobError::from(err)
    }
}

#[async_trait]
impl BlobStore for LocalFsStore {
    async fn put(
        &self,
        key: &str,
        _content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let target = self.full_path(key)?;
        let staging = self.staging_path(key);

        let written = match self.write_staged(&staging, stream).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&staging).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %staging.display(), error = %rm, "failed to remove partial blob");
                    }
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(key, size = written, "stored blob");
        Ok(PutResult { size_bytes: written })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let path = self.full_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| map_missing(e, key))?;
        let size_bytes = file.metadata().await?.len();

        let stream = ReaderStream::with_capacity(file, self.read_chunk_bytes);
        Ok(GetResult {
            stream: Box::pin(stream),
            size_bytes,
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        let path = self.full_path(key)?;
        fs::remove_file(&path).await.map_err(|e| map_missing(e, key))?;
        tracing::debug!(key, "deleted blob");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
