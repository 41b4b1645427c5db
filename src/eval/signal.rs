//! Change signals emitted by mutable mappings

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::warn;

type CancelHook = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// A stream of payload-free signals, each meaning "the mapped value may have changed"
///
/// Cancelling stops the stream and runs the cancel hook at most once. A
/// stream dropped without being cancelled is cancelled on drop.
pub struct ChangeStream {
    inner: BoxStream<'static, ()>,
    hook: Option<CancelHook>,
    cancelled: bool,
}

impl ChangeStream {
    pub fn new(signals: impl Stream<Item = ()> + Send + 'static) -> Self {
        Self {
            inner: signals.boxed(),
            hook: None,
            cancelled: false,
        }
    }

    /// A stream that never signals
    pub fn never() -> Self {
        Self::new(stream::pending())
    }

    /// Run `hook` when the stream is cancelled
    pub fn with_cancel(
        mut self,
        hook: impl FnOnce() -> Result<(), String> + Send + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Stop the stream; later calls do nothing
    pub fn cancel(&mut self) -> Result<(), String> {
        if self.cancelled {
            return Ok(());
        }
        self.cancelled = true;
        self.inner = stream::empty().boxed();
        match self.hook.take() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }
}

impl Stream for ChangeStream {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Err(message) = self.cancel() {
            warn!("change stream failed to cancel on drop: {}", message);
        }
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_forwards_signals() {
        let (tx, rx) = mpsc::unbounded();
        let mut stream = ChangeStream::new(rx);
        tx.unbounded_send(()).unwrap();
        assert_eq!(stream.next().await, Some(()));
        drop(tx);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut stream = ChangeStream::never().with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(stream.cancel().is_ok());
        assert!(stream.cancel().is_ok());
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends() {
        let (_tx, rx) = mpsc::unbounded::<()>();
        let mut stream = ChangeStream::new(rx);
        stream.cancel().unwrap();
        assert!(stream.is_cancelled());
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_drop_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let stream = ChangeStream::never().with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("already gone".to_string())
        });
        drop(stream);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
