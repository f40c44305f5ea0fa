use std::sync::Arc;
use std::time::Duration;

use beam_blob::BlobStore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::errors::BeamResult;
use crate::record::FileRecord;
use crate::store::RecordStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub purged: usize,
    pub failed: usize,
}

/// Periodic removal of expired files.
pub struct ExpirySweeper {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            records,
            blobs,
            clock,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep.
    ///
    /// Only the expiry query itself can fail the sweep. Per-record failures
    /// are counted and logged and the remaining records are still processed.
    pub async fn sweep_once(&self) -> BeamResult<SweepReport> {
        let now = self.clock.now();
        let expired = self.records.expired_before(now).await?;

        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };

        for record in &expired {
            if self.purge(record).await {
                report.purged += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    /// Blob first, then record. A blob that is already gone counts as removed;
    /// any other blob error keeps the record so the next sweep retries.
    async fn purge(&self, record: &FileRecord) -> bool {
        match self.blobs.delete(&record.storage_path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(code = %record.code, "expired blob already gone")
            }
            Err(e) => {
                warn!(
                    code = %record.code,
                    path = %record.storage_path,
                    error = %e,
                    "failed to remove expired blob"
                );
                return false;
            }
        }

        match self.records.delete(record).await {
            Ok(_) => {
                info!(code = %record.code, name = %record.original_name, "expired file removed");
                true
            }
            Err(e) => {
                warn!(code = %record.code, error = %e, "failed to delete expired record");
                false
            }
        }
    }

    /// Sweep on every tick until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "expiry sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep_once().await {
                Ok(report) if report.expired > 0 => info!(
                    expired = report.expired,
                    purged = report.purged,
                    failed = report.failed,
                    "sweep finished"
                ),
                Ok(_) => debug!("no expired files"),
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }

        info!("expiry sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
