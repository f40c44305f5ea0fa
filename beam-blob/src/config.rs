use std::path::PathBuf;

/// Configuration for blob storage
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Directory holding one file per live blob
    pub root: PathBuf,

    /// Absolute max size allowed for a single blob (safety guard)
    pub max_blob_bytes: u64,

    /// Buffer size used when streaming a blob back out
    pub read_chunk_bytes: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            max_blob_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            read_chunk_bytes: 64 * 1024,
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage directory
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    /// Set the read buffer size
    pub fn with_read_chunk_bytes(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = bytes.max(1);
        self
    }
}
