//! The file lifecycle engine.
//!
//! `BeamEngine` owns the injected stores and wires upload, lookup and
//! download to code allocation and burn scheduling. The expiry sweeper is
//! built from the same stores and run by the process entry point.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use beam_blob::{BlobStore, DefaultNameStrategy, StorageNameStrategy};
use tracing::{debug, info, warn};

use crate::allocator::CodeAllocator;
use crate::burn::BurnScheduler;
use crate::clock::{Clock, SystemClock};
use crate::config::BeamConfig;
use crate::download::{CompletionStream, Download, StreamOutcome};
use crate::errors::{BeamError, BeamResult};
use crate::ingest::{clean_filename, SizeLimited, UploadRequest};
use crate::record::{Code, FileMeta, FileRecord, UploadReceipt};
use crate::store::RecordStore;
use crate::sweeper::ExpirySweeper;

const NO_FILE: &str = "No file received";
const UNKNOWN_CODE: &str = "Invalid or expired code";
const FILE_NOT_FOUND: &str = "File not found";
const FILE_MISSING_ON_DISK: &str = "File not found on disk";

#[derive(Clone)]
pub struct BeamEngine {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    names: Arc<dyn StorageNameStrategy>,
    allocator: Arc<CodeAllocator>,
    burns: BurnScheduler,
    config: BeamConfig,
}

impl BeamEngine {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, config: BeamConfig) -> Self {
        let burns = BurnScheduler::new(Arc::clone(&records), Arc::clone(&blobs), config.burn_grace);
        let allocator = CodeAllocator::new(config.code_digits, config.code_max_attempts);
        Self {
            records,
            blobs,
            clock: Arc::new(SystemClock),
            names: Arc::new(DefaultNameStrategy),
            allocator: Arc::new(allocator),
            burns,
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    pub fn burns(&self) -> &BurnScheduler {
        &self.burns
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Expiry sweeper over the same stores and clock.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.records),
            Arc::clone(&self.blobs),
            Arc::clone(&self.clock),
            self.config.sweep_interval,
        )
    }

    /// Store a file and issue its retrieval code.
    ///
    /// The blob is written first. The record is created only after the
    /// write succeeds, and the blob is removed again if that fails.
    pub async fn upload(&self, req: UploadRequest) -> BeamResult<UploadReceipt> {
        let filename = clean_filename(&req.filename).ok_or_else(|| BeamError::validation(NO_FILE))?;
        let mime_type = req.mime_type();
        let burn_after_read = req.burn_after_read;
        let expiry = req.expiry;

        let created_at = self.clock.now();
        let lifetime = chrono::Duration::seconds(expiry.duration().as_secs() as i64);
        let expires_at = created_at + lifetime;

        let first = self.allocator.propose();
        let key = self.names.object_key(first.as_str(), created_at, &filename);

        let (body, tripped) = SizeLimited::new(req.body, self.config.max_upload_bytes);
        let put = match self.blobs.put(&key, Some(&mime_type), Box::pin(body)).await {
            Ok(put) => put,
            Err(_) if tripped.load(Ordering::SeqCst) => {
                return Err(BeamError::validation(format!(
                    "File exceeds maximum size of {} bytes",
                    self.config.max_upload_bytes
                )));
            }
            Err(e) => {
                warn!(name = %filename, error = %e, "failed to store upload");
                return Err(e.into());
            }
        };

        let claimed = self
            .allocator
            .claim(self.records.as_ref(), first, |code| FileRecord {
                code,
                original_name: filename.clone(),
                size: put.size_bytes,
                mime_type: mime_type.clone(),
                storage_path: key.clone(),
                burn_after_read,
                expires_at,
                created_at,
            })
            .await;

        let record = match claimed {
            Ok(record) => record,
            Err(e) => {
                warn!(name = %filename, error = %e, "failed to create record, removing blob");
                if let Err(rollback) = self.blobs.delete(&key).await {
                    warn!(path = %key, error = %rollback, "blob rollback failed");
                }
                return Err(e);
            }
        };

        info!(
            code = %record.code,
            name = %record.original_name,
            size = record.size,
            expires = %expiry.label(),
            burn_after_read,
            "upload stored"
        );
        if burn_after_read {
            info!(code = %record.code, "file will burn after its first download");
        }

        Ok(UploadReceipt {
            code: record.code,
            expires: expiry.label(),
            expires_at,
        })
    }

    /// Metadata for a live code.
    pub async fn meta(&self, code: &Code) -> BeamResult<FileMeta> {
        let record = self.live_record(code, UNKNOWN_CODE).await?;
        Ok(record.meta())
    }

    /// Open a live file for streaming.
    ///
    /// A record whose blob has vanished is purged and reported as not found.
    /// For burn-after-read files, the end of the returned stream (complete,
    /// failed or dropped) schedules the burn.
    pub async fn download(&self, code: &Code) -> BeamResult<Download> {
        let record = self.live_record(code, FILE_NOT_FOUND).await?;

        let blob = match self.blobs.get(&record.storage_path).await {
            Ok(blob) => blob,
            Err(e) if e.is_not_found() => {
                self.purge_stale(&record).await;
                return Err(BeamError::not_found(FILE_MISSING_ON_DISK));
            }
            Err(e) => {
                warn!(code = %record.code, error = %e, "failed to open blob");
                return Err(BeamError::Storage(e));
            }
        };

        let burns = self.burns.clone();
        let hooked = record.clone();
        let body = CompletionStream::new(blob.stream, move |outcome, sent| {
            debug!(code = %hooked.code, ?outcome, sent, "download stream closed");
            if outcome != StreamOutcome::Completed {
                debug!(code = %hooked.code, "partial download still counts as read");
            }
            if hooked.burn_after_read {
                burns.schedule(hooked);
            }
        });

        Ok(Download {
            record,
            body: Box::pin(body),
        })
    }

    /// Drop pending burns. Called once at process teardown.
    pub fn shutdown(&self) {
        self.burns.shutdown();
    }

    async fn live_record(&self, code: &Code, missing: &str) -> BeamResult<FileRecord> {
        match self.records.get(code).await? {
            Some(record) if !record.is_expired(self.clock.now()) => Ok(record),
            Some(_) => {
                debug!(code = %code, "code expired, awaiting sweep");
                Err(BeamError::not_found(missing))
            }
            None => Err(BeamError::not_found(missing)),
        }
    }

    async fn purge_stale(&self, record: &FileRecord) {
        match self.records.delete(record).await {
            Ok(true) => warn!(code = %record.code, path = %record.storage_path, "blob missing, stale record purged"),
            Ok(false) => debug!(code = %record.code, "stale record already gone"),
            Err(e) => warn!(code = %record.code, error = %e, "failed to purge stale record"),
        }
    }
}
