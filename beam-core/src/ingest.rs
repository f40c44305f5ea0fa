//! Upload input and the size guard applied while it streams to storage.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use beam_blob::ByteStream;
use bytes::Bytes;
use futures_core::Stream;
use pin_project::pin_project;

use crate::record::{burn_flag_from_form, Expiry};

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// One file handed to the engine for storage.
pub struct UploadRequest {
    pub filename: String,
    pub content_type: Option<String>,
    pub burn_after_read: bool,
    pub expiry: Expiry,
    pub body: ByteStream,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, body: ByteStream) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            burn_after_read: false,
            expiry: Expiry::default(),
            body,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn burn_after_read(mut self, burn: bool) -> Self {
        self.burn_after_read = burn;
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Apply the raw `burn_after` and `expire_in` form values.
    pub fn with_form_options(self, burn_after: Option<&str>, expire_in: Option<&str>) -> Self {
        self.burn_after_read(burn_flag_from_form(burn_after))
            .expiry(Expiry::from_form(expire_in))
    }

    pub(crate) fn mime_type(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_MIME)
            .to_string()
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("burn_after_read", &self.burn_after_read)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Last path component of a client-supplied filename, or `None` if nothing usable is left.
pub fn clean_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Fails the stream once more than `max` bytes have passed through.
#[pin_project]
pub(crate) struct SizeLimited<S> {
    #[pin]
    inner: S,
    max: u64,
    seen: u64,
    tripped: Arc<AtomicBool>,
}

impl<S> SizeLimited<S> {
    /// Returns the wrapped stream and a flag set if the limit was hit.
    pub(crate) fn new(inner: S, max: u64) -> (Self, Arc<AtomicBool>) {
        let tripped = Arc::new(AtomicBool::new(false));
        let stream = Self {
            inner,
            max,
            seen: 0,
            tripped: Arc::clone(&tripped),
        };
        (stream, tripped)
    }
}

impl<S> Stream for SizeLimited<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                *this.seen += chunk.len() as u64;
                if *this.seen > *this.max {
                    this.tripped.store(true, Ordering::SeqCst);
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("upload exceeds {} bytes", this.max),
                    ))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn filenames_lose_client_paths() {
        assert_eq!(clean_filename("foo.txt").as_deref(), Some("foo.txt"));
        assert_eq!(clean_filename("C:\\Users\\me\\foo.txt").as_deref(), Some("foo.txt"));
        assert_eq!(clean_filename("dir/sub/foo.txt").as_deref(), Some("foo.txt"));
        assert_eq!(clean_filename("   "), None);
        assert_eq!(clean_filename("dir/"), None);
        assert_eq!(clean_filename(".."), None);
    }

    #[test]
    fn missing_content_type_defaults() {
        let req = UploadRequest::new("a", beam_blob::stream_from_bytes("x"));
        assert_eq!(req.mime_type(), DEFAULT_MIME);
        assert_eq!(req.content_type("text/plain").mime_type(), "text/plain");
    }

    #[tokio::test]
    async fn size_limit_trips_on_overflow() {
        let source = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"1234")),
            Ok(Bytes::from_static(b"5678")),
        ]);
        let (limited, tripped) = SizeLimited::new(source, 6);

        let items: Vec<_> = limited.collect().await;

        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        assert!(tripped.load(Ordering::SeqCst));
    }
}
