//! beam-core: the file lifecycle engine behind Beam.
//!
//! Upload a file, get a short numeric code, hand the code to someone else.
//! Files disappear when their lifetime runs out (the [`ExpirySweeper`]) or
//! shortly after their first download when burn-after-reading was asked for
//! (the [`BurnScheduler`]).
//!
//! Nothing in here knows about HTTP. Stores are injected as trait objects:
//! [`RecordStore`] for metadata and `beam_blob::BlobStore` for bytes.

pub mod allocator;
pub mod burn;
pub mod clock;
pub mod config;
pub mod download;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod record;
pub mod store;
pub mod sweeper;

pub use allocator::CodeAllocator;
pub use burn::{BurnScheduler, PendingBurn};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BeamConfig, ConfigMap};
pub use download::{CompletionStream, Download, StreamOutcome};
pub use engine::BeamEngine;
pub use errors::{BeamError, BeamResult, ErrorKind};
pub use ingest::UploadRequest;
pub use record::{Code, Expiry, FileMeta, FileRecord, UploadReceipt};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore, StoreError, StoreResult};
pub use sweeper::{ExpirySweeper, SweepReport};
