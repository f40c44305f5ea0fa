//! Download streaming with a completion hook.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use beam_blob::ByteStream;
use bytes::Bytes;
use futures_core::Stream;
use pin_project::{pin_project, pinned_drop};

use crate::record::FileRecord;

/// How a download stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The caller read every byte.
    Completed,
    /// Reading from storage failed part way.
    Failed,
    /// The stream was dropped before the end, usually a client disconnect.
    Abandoned,
}

type Hook = Box<dyn FnOnce(StreamOutcome, u64) + Send + 'static>;

/// Wraps a byte stream and calls a hook exactly once when it ends,
/// whichever way it ends. The hook receives the number of bytes yielded.
#[pin_project(PinnedDrop)]
pub struct CompletionStream<S> {
    #[pin]
    inner: S,
    hook: Option<Hook>,
    sent: u64,
}

impl<S> CompletionStream<S> {
    pub fn new<F>(inner: S, hook: F) -> Self
    where
        F: FnOnce(StreamOutcome, u64) + Send + 'static,
    {
        Self {
            inner,
            hook: Some(Box::new(hook)),
            sent: 0,
        }
    }
}

impl<S> Stream for CompletionStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let polled = this.inner.poll_next(cx);

        match &polled {
            Poll::Ready(Some(Ok(chunk))) => *this.sent += chunk.len() as u64,
            Poll::Ready(Some(Err(_))) => {
                if let Some(hook) = this.hook.take() {
                    hook(StreamOutcome::Failed, *this.sent);
                }
            }
            Poll::Ready(None) => {
                if let Some(hook) = this.hook.take() {
                    hook(StreamOutcome::Completed, *this.sent);
                }
            }
            Poll::Pending => {}
        }

        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[pinned_drop]
impl<S> PinnedDrop for CompletionStream<S> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if let Some(hook) = this.hook.take() {
            hook(StreamOutcome::Abandoned, *this.sent);
        }
    }
}

/// An open download: the record it was resolved from and its byte stream.
pub struct Download {
    pub record: FileRecord,
    pub body: ByteStream,
}

impl Download {
    /// `attachment` disposition carrying the original filename.
    pub fn content_disposition(&self) -> String {
        let name: String = self
            .record
            .original_name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("attachment; filename=\"{}\"", name)
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("record", &self.record)
            .field("body", &"<stream>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<(StreamOutcome, u64)>>>, impl FnOnce(StreamOutcome, u64) + Send + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |outcome: StreamOutcome, sent: u64| sink.lock().unwrap().push((outcome, sent)))
    }

    fn chunks(items: Vec<io::Result<Bytes>>) -> impl Stream<Item = io::Result<Bytes>> {
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn fires_once_on_completion() {
        let (calls, hook) = recorder();
        let stream = CompletionStream::new(
            chunks(vec![Ok(Bytes::from_static(b"he")), Ok(Bytes::from_static(b"llo"))]),
            hook,
        );

        let collected: Vec<_> = stream.collect().await;

        assert_eq!(collected.len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec![(StreamOutcome::Completed, 5)]);
    }

    #[tokio::test]
    async fn fires_once_on_read_error() {
        let (calls, hook) = recorder();
        let mut stream = Box::pin(CompletionStream::new(
            chunks(vec![
                Ok(Bytes::from_static(b"abc")),
                Err(io::Error::other("disk gone")),
                Ok(Bytes::from_static(b"def")),
            ]),
            hook,
        ));

        while stream.next().await.is_some() {}
        drop(stream);

        assert_eq!(*calls.lock().unwrap(), vec![(StreamOutcome::Failed, 3)]);
    }

    #[tokio::test]
    async fn fires_on_early_drop() {
        let (calls, hook) = recorder();
        let mut stream = Box::pin(CompletionStream::new(
            chunks(vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))]),
            hook,
        ));

        let _ = stream.next().await;
        drop(stream);

        assert_eq!(*calls.lock().unwrap(), vec![(StreamOutcome::Abandoned, 3)]);
    }

    #[test]
    fn disposition_quotes_the_original_name() {
        let now = chrono::Utc::now();
        let download = Download {
            record: FileRecord {
                code: crate::record::Code::parse("4821"),
                original_name: "my \"report\".pdf".into(),
                size: 0,
                mime_type: "application/pdf".into(),
                storage_path: "k".into(),
                burn_after_read: false,
                expires_at: now,
                created_at: now,
            },
            body: beam_blob::stream_from_bytes(Bytes::new()),
        };

        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"my _report_.pdf\""
        );
    }
}
