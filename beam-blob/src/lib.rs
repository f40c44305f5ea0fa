//! # beam-blob: blob storage for Beam
//!
//! `beam-blob` holds the physical bytes behind every Beam upload. It knows
//! nothing about retrieval codes, expiry or burn-after-reading; the lifecycle
//! engine in `beam-core` decides *when* blobs are written and removed, this
//! crate only decides *how*.
//!
//! ## Key Features
//!
//! - **Streaming-first**: uploads are written chunk by chunk and downloads are
//!   served as a [`ByteStream`], never buffered whole
//! - **Atomic writes**: [`LocalFsStore`] writes to a staging file and renames it
//!   into place, so a failed upload leaves no orphan behind
//! - **Collision-safe names**: [`DefaultNameStrategy`] mixes the retrieval code,
//!   the creation time and a random nonce, so a reused code never lands on a
//!   blob that is still being flushed or deleted
//! - **Storage agnostic**: everything goes through the [`BlobStore`] trait
//!
//! ## Quick Start
//!
//! ```rust
//! use beam_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryBlobStore::new();
//!
//! store.put("0042_1700000000_ab12cd34.txt", Some("text/plain"), stream_from_bytes("hello")).await?;
//!
//! let opened = store.get("0042_1700000000_ab12cd34.txt").await?;
//! assert_eq!(opened.size_bytes, 5);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod local;
mod memory;
pub mod store;
mod types;

pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use local::LocalFsStore;
pub use memory::MemoryBlobStore;
pub use store::{
    safe_extension, BlobStore, DefaultNameStrategy, GetResult, PutResult,
    StorageNameStrategy,
};
pub use types::{collect_stream, stream_from_bytes, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        stream_from_bytes, BlobError, BlobResult, BlobStore, ByteStream, LocalFsStore,
        MemoryBlobStore,
    };
}
