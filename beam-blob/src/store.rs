use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{BlobResult, ByteStream};

/// Core blob storage operations - must be implemented by all storage backends
///
/// Keys are flat names produced by a [`StorageNameStrategy`]; backends reject
/// keys that could escape their root.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob from a stream.
    ///
    /// The blob becomes visible under `key` only once the whole stream has
    /// been written; a failed write leaves nothing behind.
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult>;

    /// Open a blob as a stream. Missing blobs yield `BlobError::NotFound`.
    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    /// Delete a blob. Missing blobs yield `BlobError::NotFound`.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Backend name for logs
    fn kind(&self) -> &'static str;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
}

impl std::fmt::Debug for GetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResult")
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Strategy for generating physical blob names
pub trait StorageNameStrategy: Send + Sync {
    /// Generate the storage key for a new upload.
    ///
    /// The same `code` may be handed out again once its record is gone, so
    /// the key must not collide with a blob written for an earlier holder.
    ///
    /// The key is chosen before the code is claimed. If the claim collides
    /// and a different code is drawn, the code embedded in the key is stale;
    /// records always carry the key, so it is a naming hint only.
    fn object_key(&self, code: &str, created_at: DateTime<Utc>, filename: &str) -> String;
}

/// Default naming: `{code}_{unix_seconds}_{nonce}{.ext}`
#[derive(Debug, Clone, Default)]
pub struct DefaultNameStrategy;

impl StorageNameStrategy for DefaultNameStrategy {
    fn object_key(&self, code: &str, created_at: DateTime<Utc>, filename: &str) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}{}",
            code,
            created_at.timestamp(),
            &nonce[..8],
            safe_extension(filename)
        )
    }
}

/// Extension of `filename` including the dot, or empty when it is missing or
/// not plain ASCII alphanumerics.
pub fn safe_extension(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return String::new();
    }
    format!(".{}", ext)
}

/// Reject keys that are empty or could address anything outside a flat namespace.
pub(crate) fn validate_key(key: &str) -> BlobResult<()> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..");
    if bad {
        return Err(crate::BlobError::invalid(format!("invalid blob key '{}'", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_key_embeds_code_timestamp_and_extension() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let key = DefaultNameStrategy.object_key("0421", at, "report.final.PDF");

        assert!(key.starts_with(&format!("0421_{}_", at.timestamp())));
        assert!(key.ends_with(".PDF"));
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn object_keys_differ_for_same_code_and_second() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let a = DefaultNameStrategy.object_key("0421", at, "a.txt");
        let b = DefaultNameStrategy.object_key("0421", at, "a.txt");
        assert_ne!(a, b);
    }

    #[test]
    fn suspicious_extensions_are_dropped() {
        assert_eq!(safe_extension("notes"), "");
        assert_eq!(safe_extension("x.tar/../../etc"), "");
        assert_eq!(safe_extension("image.jp g"), "");
        assert_eq!(safe_extension("photo.jpeg"), ".jpeg");
    }

    #[test]
    fn keys_with_path_components_are_rejected() {
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("nested/key").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("").is_err());
    }
}
