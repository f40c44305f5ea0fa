//! Upload form parsing.
//!
//! The form is read with `multer` straight off the request body. The file
//! field is spooled to a temporary file as it arrives so the text fields
//! (which may come after it) are known before the engine sees the bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap};
use beam_blob::ByteStream;
use beam_core::errors::BeamError;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

const NO_FILE: &str = "No file received";
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Name of the form field carrying the file.
    pub file_field: String,
    /// Largest file accepted, in bytes.
    pub max_file_size: u64,
    /// Where uploads are spooled while the form is read.
    pub spool_dir: PathBuf,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            file_field: "document".to_string(),
            max_file_size: 2 * 1024 * 1024 * 1024,
            spool_dir: std::env::temp_dir(),
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_field(mut self, name: &str) -> Self {
        self.file_field = name.to_string();
        self
    }

    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = dir.into();
        self
    }
}

/// A file field written to disk. The file is removed when this is dropped.
#[derive(Debug)]
pub struct SpooledFile {
    path: PathBuf,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl SpooledFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the spooled bytes back. Keep `self` alive until the stream is consumed.
    pub async fn open_stream(&self) -> std::io::Result<ByteStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::pin(ReaderStream::with_capacity(file, READ_CHUNK_BYTES)))
    }
}

impl Drop for SpooledFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove spooled upload");
            }
        }
    }
}

/// Parsed upload form: the file (if any) and every text field.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<SpooledFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

fn parse_error(e: multer::Error) -> BeamError {
    BeamError::validation(format!("Failed to parse multipart data: {}", e))
}

pub async fn read_upload_form(
    headers: &HeaderMap,
    body: Body,
    config: &MultipartConfig,
) -> Result<UploadForm, BeamError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let boundary = multer::parse_boundary(content_type).map_err(|_| BeamError::validation(NO_FILE))?;
    let mut multipart = multer::Multipart::new(body.into_data_stream(), boundary);
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(parse_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);

        match filename {
            Some(filename) if name == config.file_field && form.file.is_none() => {
                if filename.trim().is_empty() {
                    // Browsers send an empty part when no file was chosen.
                    while field.chunk().await.map_err(parse_error)?.is_some() {}
                    continue;
                }
                let content_type = field.content_type().map(|ct| ct.to_string());
                let spooled = spool_field(&mut field, filename, content_type, config).await?;
                tracing::debug!(
                    field = %name,
                    size = spooled.size,
                    path = %spooled.path.display(),
                    "file field spooled"
                );
                form.file = Some(spooled);
            }
            Some(_) => {
                tracing::debug!(field = %name, "ignoring extra file field");
                while field.chunk().await.map_err(parse_error)?.is_some() {}
            }
            None => {
                let value = field.text().await.map_err(parse_error)?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

async fn spool_field(
    field: &mut multer::Field<'static>,
    filename: String,
    content_type: Option<String>,
    config: &MultipartConfig,
) -> Result<SpooledFile, BeamError> {
    let io_err = |e: std::io::Error| BeamError::Storage(beam_blob::BlobError::from(e));

    tokio::fs::create_dir_all(&config.spool_dir).await.map_err(io_err)?;
    let path = config
        .spool_dir
        .join(format!("beam-upload-{}.part", uuid::Uuid::new_v4()));
    let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;

    // From here on the guard removes the file on every early return.
    let mut spooled = SpooledFile {
        path,
        filename,
        content_type,
        size: 0,
    };

    while let Some(chunk) = field.chunk().await.map_err(parse_error)? {
        spooled.size += chunk.len() as u64;
        if spooled.size > config.max_file_size {
            return Err(BeamError::validation(format!(
                "File exceeds maximum size of {} bytes",
                config.max_file_size
            )));
        }
        file.write_all(&chunk).await.map_err(io_err)?;
    }

    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(spooled)
}
