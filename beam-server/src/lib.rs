//! Process wiring for Beam: stores, engine, HTTP app and the expiry sweeper.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use beam_axum::{beam, BeamApp, MultipartConfig};
use beam_blob::{BlobConfig, LocalFsStore};
use beam_core::{BeamConfig, BeamEngine, SqliteRecordStore};
use tokio_util::sync::CancellationToken;

/// A fully wired Beam instance. The process entry point owns its lifecycle.
pub struct Beam {
    pub config: BeamConfig,
    pub app: BeamApp,
    pub engine: BeamEngine,
    records: SqliteRecordStore,
}

/// Open the stores and build the engine and HTTP app.
///
/// Creates the upload directory and the database file (with its schema)
/// when they do not exist yet.
pub async fn build(config: BeamConfig) -> Result<Beam> {
    let blobs = LocalFsStore::open(
        BlobConfig::new()
            .with_root(config.upload_dir.clone())
            .with_max_blob_bytes(config.max_upload_bytes),
    )
    .await
    .with_context(|| format!("opening upload dir {}", config.upload_dir.display()))?;

    let records = SqliteRecordStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path.display()))?;

    let engine = BeamEngine::new(
        Arc::new(records.clone()),
        Arc::new(blobs),
        config.clone(),
    );

    let multipart = MultipartConfig::new()
        .max_file_size(config.max_upload_bytes)
        .spool_dir(config.upload_dir.join(".incoming"));

    let app = beam(engine.clone(), multipart).with_static_dir(&config.static_dir);

    tracing::info!(
        uploads = %config.upload_dir.display(),
        database = %config.database_path.display(),
        blob_backend = engine.blobs().kind(),
        record_backend = engine.records().kind(),
        code_digits = config.code_digits,
        burn_grace_secs = config.burn_grace.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "beam initialised"
    );

    Ok(Beam {
        config,
        app,
        engine,
        records,
    })
}

impl Beam {
    /// Serve HTTP and sweep expired files until `shutdown` resolves, then tear down.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let sweeper = self.engine.sweeper().spawn(stop.child_token());

        let served = self
            .app
            .clone()
            .listen(self.config.bind_addr(), shutdown)
            .await;

        stop.cancel();
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "sweeper task ended abnormally");
        }
        self.engine.shutdown();
        self.records.close().await;
        tracing::info!("beam stopped");

        served
    }
}
