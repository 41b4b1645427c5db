//! Incrementally recomputed evaluation chain

use futures::future::{self, FutureExt};
use futures::StreamExt;
use log::{debug, trace};

use super::{ChangeStream, EvalChain, EvalError, Slot, Step};

/// Records steps and caches their results between pulls
///
/// Each step keeps the change stream started when it was last computed. When
/// the stream of step `k` signals, the cached results and streams of every
/// step from `k` onwards are dropped and recomputed by the next pull.
#[derive(Debug, Default)]
pub struct WatchChain {
    steps: Vec<Step>,
    /// Steps ending an arm
    checkpoints: Vec<bool>,
    values: Vec<Option<Slot>>,
    streams: Vec<Option<ChangeStream>>,
}

impl EvalChain for WatchChain {
    type Output = WatchChain;

    fn then(&mut self, step: Step) {
        self.steps.push(step);
        self.checkpoints.push(false);
        self.values.push(None);
        self.streams.push(None);
    }

    fn break_on_non_null(&mut self) -> bool {
        if let Some(last) = self.checkpoints.last_mut() {
            *last = true;
        }
        false
    }

    fn finish(self) -> WatchChain {
        self
    }
}

impl WatchChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether step `index` currently holds a result
    pub fn is_computed(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(Option::is_some)
    }

    /// Number of steps with a live change stream
    pub fn active_streams(&self) -> usize {
        self.streams.iter().filter(|s| s.is_some()).count()
    }

    /// Compute missing steps and return the rendered output
    ///
    /// Stops at the first arm whose output is a string.
    pub fn pull(&mut self) -> String {
        let initial = Slot::initial();
        for i in 0..self.steps.len() {
            if self.values[i].is_none() {
                let input = match i.checked_sub(1) {
                    Some(prev) => self.values[prev].as_ref().unwrap_or(&initial),
                    None => &initial,
                };
                trace!("computing step {}", i);
                let (slot, stream) = self.steps[i].run(input, true);
                self.values[i] = Some(slot);
                self.streams[i] = stream;
            }

            if self.checkpoints[i] {
                if let Some(text) = self.values[i].as_ref().and_then(Slot::rendered) {
                    return text.to_string();
                }
            }
        }

        self.values
            .last()
            .and_then(|slot| slot.as_ref())
            .and_then(Slot::rendered)
            .unwrap_or_default()
            .to_string()
    }

    /// Drop the results and cancel the streams of steps `from` onwards
    ///
    /// Every stream is cancelled even if an earlier one fails; the first
    /// failure is returned.
    pub fn invalidate_from(&mut self, from: usize) -> Result<(), EvalError> {
        let mut first_error = None;
        for step in from..self.steps.len() {
            self.values[step] = None;
            if let Some(mut stream) = self.streams[step].take() {
                if let Err(message) = stream.cancel() {
                    first_error.get_or_insert(EvalError::Cancel { step, message });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Wait until a step signals a change, then invalidate from that step
    ///
    /// Returns the index of the step that signalled. Streams that end are
    /// forgotten without invalidating anything. Waits forever when no stream
    /// is active.
    pub async fn changed(&mut self) -> Result<usize, EvalError> {
        loop {
            let racers: Vec<_> = self
                .streams
                .iter_mut()
                .enumerate()
                .filter_map(|(step, stream)| {
                    let stream = stream.as_mut()?;
                    Some(stream.next().map(move |signal| (step, signal)))
                })
                .collect();
            if racers.is_empty() {
                return future::pending().await;
            }

            // `select_all` resolves to the earliest ready racer in order
            let ((step, signal), _, _) = future::select_all(racers).await;
            match signal {
                Some(()) => {
                    debug!("step {} changed, invalidating {} steps", step, self.steps.len() - step);
                    self.invalidate_from(step)?;
                    return Ok(step);
                }
                None => {
                    trace!("change stream of step {} ended", step);
                    self.streams[step] = None;
                }
            }
        }
    }

    /// Cancel every stream
    pub fn close(&mut self) -> Result<(), EvalError> {
        self.invalidate_from(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Frame;
    use crate::registry::{Display, Mapping, QualifiedName, Value};
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// A mutable mapping whose value and change stream are driven by the test
    struct Source {
        value: Arc<Mutex<String>>,
        senders: Arc<Mutex<Vec<mpsc::UnboundedSender<()>>>>,
        maps: Arc<AtomicUsize>,
    }

    impl Source {
        fn new(initial: &str) -> Self {
            Self {
                value: Arc::new(Mutex::new(initial.to_string())),
                senders: Arc::new(Mutex::new(Vec::new())),
                maps: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn mapping(&self, name: &str) -> Arc<Mapping> {
            let value = self.value.clone();
            let maps = self.maps.clone();
            let senders = self.senders.clone();
            Arc::new(
                Mapping::new(QualifiedName::parse(name), "s", "s", move |_, _| {
                    maps.fetch_add(1, Ordering::SeqCst);
                    Some(Value::String(value.lock().unwrap().clone()))
                })
                .with_subscribe(move |_, _| {
                    let (tx, rx) = mpsc::unbounded();
                    senders.lock().unwrap().push(tx);
                    ChangeStream::new(rx)
                }),
            )
        }

        fn set(&self, value: &str) {
            *self.value.lock().unwrap() = value.to_string();
            for tx in self.senders.lock().unwrap().iter() {
                let _ = tx.unbounded_send(());
            }
        }
    }

    fn suffix(text: &'static str) -> Arc<Mapping> {
        Arc::new(Mapping::new(QualifiedName::parse("t:suffix"), "s", "s", move |v, _| {
            Some(Value::String(format!("{}{}", v.as_str()?, text)))
        }))
    }

    fn display() -> Step {
        Step::Display {
            display: Arc::new(Display::new("s", |v, _| v.as_str().unwrap_or("").to_string())),
            viewer: None,
            invalid_marker: String::new(),
        }
    }

    #[tokio::test]
    async fn test_recomputes_only_after_changed_step() {
        let first = Source::new("a");
        let second = Source::new("x");

        let mut chain = WatchChain::new();
        chain.then(Step::Begin(Value::from("")));
        chain.then(Step::Map(first.mapping("t:first")));
        chain.then(Step::Map(suffix("-")));
        chain.then(Step::Map(second.mapping("t:second")));
        chain.then(display());
        chain.break_on_non_null();

        assert_eq!(chain.pull(), "x");
        assert_eq!(chain.active_streams(), 2);

        second.set("y");
        assert_eq!(chain.changed().await, Ok(3));
        assert!(chain.is_computed(2));
        assert!(!chain.is_computed(3));
        assert!(!chain.is_computed(4));
        assert_eq!(chain.pull(), "y");
        assert_eq!(first.maps.load(Ordering::SeqCst), 1);
        assert_eq!(second.maps.load(Ordering::SeqCst), 2);

        first.set("b");
        assert_eq!(chain.changed().await, Ok(1));
        assert!(chain.is_computed(0));
        assert!(!chain.is_computed(1));
        assert_eq!(chain.pull(), "y");
        assert_eq!(first.maps.load(Ordering::SeqCst), 2);
        assert_eq!(second.maps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ended_stream_is_forgotten() {
        let (tx, rx) = mpsc::unbounded::<()>();
        let rx = Mutex::new(Some(rx));
        let mapping = Arc::new(
            Mapping::new(QualifiedName::parse("t:once"), "s", "s", |v, _| Some(v.clone()))
                .with_subscribe(move |_, _| match rx.lock().unwrap().take() {
                    Some(rx) => ChangeStream::new(rx),
                    None => ChangeStream::never(),
                }),
        );

        let mut chain = WatchChain::new();
        chain.then(Step::Begin(Value::from("v")));
        chain.then(Step::Map(mapping));
        chain.then(display());
        chain.break_on_non_null();
        assert_eq!(chain.pull(), "v");

        drop(tx);
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), chain.changed()).await;
        assert!(pending.is_err());
        assert_eq!(chain.active_streams(), 0);
        assert!(chain.is_computed(2));
    }

    #[test]
    fn test_close_attempts_every_stream() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let failing = {
            let cancelled = cancelled.clone();
            Arc::new(
                Mapping::new(QualifiedName::parse("t:fail"), "s", "s", |v, _| Some(v.clone()))
                    .with_subscribe(move |_, _| {
                        let cancelled = cancelled.clone();
                        ChangeStream::never().with_cancel(move || {
                            cancelled.fetch_add(1, Ordering::SeqCst);
                            Err("boom".to_string())
                        })
                    }),
            )
        };
        let working = {
            let cancelled = cancelled.clone();
            Arc::new(
                Mapping::new(QualifiedName::parse("t:ok"), "s", "s", |v, _| Some(v.clone()))
                    .with_subscribe(move |_, _| {
                        let cancelled = cancelled.clone();
                        ChangeStream::never().with_cancel(move || {
                            cancelled.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                    }),
            )
        };

        let mut chain = WatchChain::new();
        chain.then(Step::Begin(Value::from("v")));
        chain.then(Step::Map(failing));
        chain.then(Step::Map(working));
        chain.then(display());
        chain.break_on_non_null();
        chain.pull();

        assert_eq!(
            chain.close(),
            Err(EvalError::Cancel {
                step: 1,
                message: "boom".to_string()
            })
        );
        assert_eq!(cancelled.load(Ordering::SeqCst), 2);
        assert_eq!(chain.close(), Ok(()));
        assert_eq!(cancelled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_checkpoint_short_circuits_later_arms() {
        let mut chain = WatchChain::new();
        chain.then(Step::Begin(Value::from("first")));
        chain.then(display());
        chain.break_on_non_null();
        chain.then(Step::Begin(Value::from("second")));
        chain.then(display());
        chain.break_on_non_null();
        chain.then(Step::Fallback("fallback".to_string()));

        assert_eq!(chain.pull(), "first");
        assert!(!chain.is_computed(2));
    }

    #[test]
    fn test_falls_through_to_marker() {
        let mut chain = WatchChain::new();
        chain.then(Step::Begin(Value::from("v")));
        chain.then(Step::Map(Arc::new(Mapping::new(
            QualifiedName::parse("t:null"),
            "s",
            "s",
            |_, _| None,
        ))));
        chain.then(display());
        chain.break_on_non_null();
        chain.then(Step::Fallback("{null:x}".to_string()));
        assert_eq!(chain.pull(), "{null:x}");
        assert_eq!(
            chain.values[1],
            Some(Slot::Frames(vec![Frame::default()]))
        );
    }
}
