use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Short numeric retrieval code handed to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Zero-padded decimal code of `digits` width.
    pub fn from_number(n: u32, digits: u32) -> Self {
        Self(format!("{:0width$}", n, width = digits as usize))
    }

    /// Wrap a code received from a caller.
    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifetime selected at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    TenMinutes,
    #[default]
    OneHour,
    TwentyFourHours,
}

impl Expiry {
    /// `10m` and `24h` select their lifetimes; anything else is one hour.
    pub fn from_form(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("10m") => Expiry::TenMinutes,
            Some("24h") => Expiry::TwentyFourHours,
            _ => Expiry::OneHour,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Expiry::TenMinutes => Duration::from_secs(10 * 60),
            Expiry::OneHour => Duration::from_secs(60 * 60),
            Expiry::TwentyFourHours => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Human-readable lifetime as returned to uploaders (`10m0s`, `1h0m0s`, `24h0m0s`).
    pub fn label(&self) -> String {
        format_duration(self.duration())
    }
}

/// Hours/minutes/seconds rendering without zero-padding, e.g. `1h0m0s`, `10m0s`, `45s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Burn flag as sent by the upload form: only the literal `true` enables it.
pub fn burn_flag_from_form(value: Option<&str>) -> bool {
    value.map(str::trim) == Some("true")
}

/// The sole persisted entity: one uploaded file and where its bytes live.
///
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub code: Code,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub storage_path: String,
    pub burn_after_read: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Metadata view returned by the lookup operation.
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            name: self.original_name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            uploaded_at: self.created_at,
            burn_after: self.burn_after_read,
        }
    }
}

/// Public metadata of a live file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub burn_after: bool,
}

/// What the uploader gets back.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub code: Code,
    pub expires: String,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
}
