//! # Errors
//!
//! Beam keeps the Feathers-style error model of its HTTP surface: every
//! engine error has a kind with a status code, a `name` and a `className`.
//! The engine itself stays transport-agnostic; `beam-axum` decides how the
//! kind is serialized.
//!
//! Taxonomy:
//! - `Validation`: malformed or missing upload payload, no side effects
//! - `NotFound`: unknown, expired, or blob missing on storage
//! - `Storage`: blob write/read failure
//! - `Persistence`: record store failure
//! - `CodeSpaceExhausted`: allocation gave up after its retry bound

use beam_blob::BlobError;
use thiserror::Error;

use crate::store::StoreError;

/// A convenience result type for engine operations.
pub type BeamResult<T> = std::result::Result<T, BeamError>;

/// Feathers-ish error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,   // 400
    NotFound,     // 404
    GeneralError, // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::GeneralError => 500,
        }
    }

    /// Feathers error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Feathers error `className` (commonly kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// Errors surfaced by the lifecycle engine to the requesting caller.
#[derive(Debug, Error)]
pub enum BeamError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[source] BlobError),

    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    #[error("No free retrieval code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
}

impl BeamError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BeamError::Validation(_) => ErrorKind::BadRequest,
            BeamError::NotFound(_) => ErrorKind::NotFound,
            BeamError::Storage(_)
            | BeamError::Persistence(_)
            | BeamError::CodeSpaceExhausted { .. } => ErrorKind::GeneralError,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message suitable for returning to clients.
    ///
    /// Server-side failures are reduced to a fixed phrase; their detail
    /// belongs in the logs.
    pub fn client_message(&self) -> String {
        match self {
            BeamError::Validation(msg) | BeamError::NotFound(msg) => msg.clone(),
            BeamError::Storage(_) => "Failed to save file".to_string(),
            BeamError::Persistence(_) => "Database error".to_string(),
            BeamError::CodeSpaceExhausted { .. } => "No retrieval code available".to_string(),
        }
    }
}

impl From<BlobError> for BeamError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::TooLarge { max } => {
                BeamError::Validation(format!("File exceeds maximum size of {} bytes", max))
            }
            other => BeamError::Storage(other),
        }
    }
}

impl From<StoreError> for BeamError {
    fn from(err: StoreError) -> Self {
        BeamError::Persistence(err)
    }
}
