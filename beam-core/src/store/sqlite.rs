use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{RecordStore, StoreError, StoreResult};
use crate::record::{Code, FileRecord};

const COLUMNS: &str = "code, original_name, size, mime_type, storage_path, burn_after_read, expires_at, created_at";

/// SQLite-backed record store.
///
/// Timestamps are stored as unix milliseconds so the expiry range query
/// compares integers.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StoreError::backend)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single pinned connection keeps it alive.
    pub async fn in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_records (
                code TEXT PRIMARY KEY NOT NULL,
                original_name TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                burn_after_read INTEGER NOT NULL DEFAULT 0,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_file_records_expires_at ON file_records(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn millis_to_utc(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        StoreError::backend(std::io::Error::other(format!("invalid timestamp: {ms}")))
    })
}

fn row_to_record(row: &SqliteRow) -> StoreResult<FileRecord> {
    let code: String = row.try_get("code")?;
    let size: i64 = row.try_get("size")?;
    Ok(FileRecord {
        code: Code::parse(&code),
        original_name: row.try_get("original_name")?,
        size: u64::try_from(size).unwrap_or_default(),
        mime_type: row.try_get("mime_type")?,
        storage_path: row.try_get("storage_path")?,
        burn_after_read: row.try_get("burn_after_read")?,
        expires_at: millis_to_utc(row.try_get("expires_at")?)?,
        created_at: millis_to_utc(row.try_get("created_at")?)?,
    })
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::backend(err)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &FileRecord) -> StoreResult<()> {
        let result = sqlx::query(&format!(
            "INSERT INTO file_records ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(record.code.as_str())
        .bind(&record.original_name)
        .bind(i64::try_from(record.size).unwrap_or(i64::MAX))
        .bind(&record.mime_type)
        .bind(&record.storage_path)
        .bind(record.burn_after_read)
        .bind(record.expires_at.timestamp_millis())
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateCode(record.code.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, code: &Code) -> StoreResult<Option<FileRecord>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM file_records WHERE code = ?"))
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn delete(&self, record: &FileRecord) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM file_records WHERE code = ? AND storage_path = ?")
            .bind(record.code.as_str())
            .bind(&record.storage_path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expired_before(&self, now: DateTime<Utc>) -> StoreResult<Vec<FileRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM file_records WHERE expires_at < ? ORDER BY expires_at"
        ))
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn len(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}
