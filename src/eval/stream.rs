//! Continuously updated rendering of a whole template

use futures::future::{self, Either, FutureExt};
use futures::stream::{self, Stream};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::{EvalError, WatchChain};

pub(crate) enum RenderElement {
    Static(String),
    Chain(WatchChain),
}

/// A stream of renderings, one per change of any placeholder
///
/// The first call to [`next`](RenderStream::next) yields once every element
/// has produced its first value. Later calls wait for a change and yield the
/// updated concatenation; every change is emitted, even if the output is
/// unchanged. The stream only ends once its cancellation token is cancelled.
pub struct RenderStream {
    elements: Vec<RenderElement>,
    buffer: Vec<String>,
    token: CancellationToken,
    started: bool,
    closed: bool,
}

impl RenderStream {
    pub(crate) fn new(elements: Vec<RenderElement>) -> Self {
        Self {
            buffer: vec![String::new(); elements.len()],
            elements,
            token: CancellationToken::new(),
            started: false,
            closed: false,
        }
    }

    /// Token that ends the stream when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the next rendering; None once cancelled
    pub async fn next(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        if self.token.is_cancelled() {
            self.shutdown();
            return None;
        }

        if !self.started {
            self.started = true;
            for index in 0..self.elements.len() {
                self.pull(index);
            }
            return Some(self.buffer.concat());
        }

        let fired = {
            let racers: Vec<_> = self
                .elements
                .iter_mut()
                .enumerate()
                .filter_map(|(index, element)| match element {
                    RenderElement::Chain(chain) => {
                        Some(chain.changed().map(move |result| (index, result)).boxed_local())
                    }
                    RenderElement::Static(_) => None,
                })
                .collect();

            let cancelled = self.token.cancelled().boxed_local();
            if racers.is_empty() {
                cancelled.await;
                None
            } else {
                match future::select(cancelled, future::select_all(racers)).await {
                    Either::Left(_) => None,
                    Either::Right((((index, result), _, _), _)) => Some((index, result)),
                }
            }
        };

        let Some((index, result)) = fired else {
            self.shutdown();
            return None;
        };
        if let Err(err) = result {
            warn!("element {}: {}", index, err);
        }
        self.pull(index);
        Some(self.buffer.concat())
    }

    fn pull(&mut self, index: usize) {
        let text = match &mut self.elements[index] {
            RenderElement::Static(text) => text.clone(),
            RenderElement::Chain(chain) => chain.pull(),
        };
        self.buffer[index] = text;
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.close() {
            warn!("render stream closed with error: {}", err);
        }
    }

    /// Cancel every change stream of every element
    ///
    /// All elements are closed even if one fails; the first failure is
    /// returned. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), EvalError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.token.cancel();
        debug!("closing render stream with {} elements", self.elements.len());

        let mut first_error = None;
        for element in &mut self.elements {
            if let RenderElement::Chain(chain) = element {
                if let Err(err) = chain.close() {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Adapt into a `futures` stream
    pub fn into_stream(self) -> impl Stream<Item = String> {
        stream::unfold(self, |mut render| async move {
            let text = render.next().await?;
            Some((text, render))
        })
    }
}
