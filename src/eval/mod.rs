//! Evaluation of bound templates
//!
//! A placeholder is evaluated by an [`EvalChain`]: a linear sequence of
//! [`Step`]s, each mapping the [`Slot`] produced by the previous one. Every
//! arm of the placeholder contributes its steps followed by a display step,
//! and the chain is asked after each arm whether it can stop. Two chains share
//! this driver:
//!
//! - [`GetChain`] runs steps as they are added and stops at the first arm that
//!   rendered a string.
//! - [`WatchChain`] records every step, caches their results, and keeps the
//!   change streams of mutable mappings so that only the steps after a change
//!   are recomputed.
//!
//! Nested argument expressions are flattened into the same sequence with
//! frame push/pop steps, so their change streams invalidate the chain like
//! any other step.

mod get;
mod signal;
mod stream;
mod watch;

pub use get::GetChain;
pub use signal::ChangeStream;
pub use stream::RenderStream;
pub use watch::WatchChain;

use std::sync::Arc;

use thiserror::Error;

use crate::config::RenderConfig;
use crate::registry::{Display, Mapping, Value, INVALID};
use crate::template::{BoundElement, BoundTemplate, CoalescePath, ResolvedArg, ResolvedPath};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// A cancel hook reported a failure
    #[error("failed to cancel change stream of step {step}: {message}")]
    Cancel { step: usize, message: String },
}

/// A mapping application in progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// None once any mapping on the way produced no value
    pub receiver: Option<Value>,
    /// Arguments collected for the next mapping
    pub args: Vec<Option<Value>>,
}

/// The result of a step
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Stack of frames; nested arguments push a frame on top
    Frames(Vec<Frame>),
    /// Output of a display or fallback step
    Rendered(Option<String>),
}

impl Slot {
    pub fn initial() -> Self {
        Slot::Rendered(None)
    }

    pub fn rendered(&self) -> Option<&str> {
        match self {
            Slot::Rendered(Some(text)) => Some(text),
            _ => None,
        }
    }

    fn frames(&self) -> Vec<Frame> {
        match self {
            Slot::Frames(frames) => frames.clone(),
            Slot::Rendered(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    /// Start an arm from the context
    Begin(Value),
    /// Start a nested argument
    ///
    /// The nested frame has no receiver when the enclosing frame has none, or
    /// when it is an alternative arm and an earlier arm already has a value.
    PushFrame { context: Value, alternative: bool },
    Const(Value),
    Unset,
    /// Replace the last `n` arguments with a list of those that have a value
    Collect(usize),
    Map(Arc<Mapping>),
    /// Finish a nested argument, passing its receiver to the enclosing frame
    PopFrame { alternative: bool },
    Display {
        display: Arc<Display>,
        viewer: Option<Value>,
        invalid_marker: String,
    },
    Fallback(String),
}

impl Step {
    /// Compute the slot after this step
    ///
    /// With `watch` set, a map step over a mutable mapping also starts its
    /// change stream. Mappings are never called or subscribed without a receiver.
    pub fn run(&self, input: &Slot, watch: bool) -> (Slot, Option<ChangeStream>) {
        match self {
            Step::Begin(context) => (
                Slot::Frames(vec![Frame {
                    receiver: Some(context.clone()),
                    args: Vec::new(),
                }]),
                None,
            ),
            Step::PushFrame {
                context,
                alternative,
            } => {
                let mut frames = input.frames();
                let skip = match frames.last() {
                    // The enclosing mapping will not be applied
                    Some(parent) if parent.receiver.is_none() => true,
                    Some(parent) => {
                        *alternative && parent.args.last().is_some_and(Option::is_some)
                    }
                    None => false,
                };
                frames.push(Frame {
                    receiver: (!skip).then(|| context.clone()),
                    args: Vec::new(),
                });
                (Slot::Frames(frames), None)
            }
            Step::Const(value) => (push_arg(input, Some(value.clone())), None),
            Step::Unset => (push_arg(input, None), None),
            Step::Collect(n) => {
                let mut frames = input.frames();
                if let Some(top) = frames.last_mut() {
                    let at = top.args.len().saturating_sub(*n);
                    let items: Vec<Value> = top.args.drain(at..).flatten().collect();
                    top.args.push(Some(Value::List(items)));
                }
                (Slot::Frames(frames), None)
            }
            Step::Map(mapping) => {
                let mut frames = input.frames();
                let mut stream = None;
                if let Some(top) = frames.last_mut() {
                    let args = std::mem::take(&mut top.args);
                    if let Some(receiver) = top.receiver.take() {
                        if watch {
                            stream = mapping
                                .subscribe
                                .as_ref()
                                .map(|subscribe| subscribe(&receiver, &args));
                        }
                        top.receiver = (mapping.map)(&receiver, &args);
                    }
                }
                (Slot::Frames(frames), stream)
            }
            Step::PopFrame { alternative } => {
                let mut frames = input.frames();
                if let Some(popped) = frames.pop() {
                    if let Some(parent) = frames.last_mut() {
                        if *alternative {
                            if let (Some(value), Some(last)) =
                                (popped.receiver, parent.args.last_mut())
                            {
                                if last.is_none() {
                                    *last = Some(value);
                                }
                            }
                        } else {
                            parent.args.push(popped.receiver);
                        }
                    }
                }
                (Slot::Frames(frames), None)
            }
            Step::Display {
                display,
                viewer,
                invalid_marker,
            } => {
                let receiver = input
                    .frames()
                    .into_iter()
                    .next()
                    .and_then(|frame| frame.receiver);
                let rendered = receiver.map(|value| {
                    let text = (display.render)(&value, viewer.as_ref());
                    if text == INVALID {
                        invalid_marker.clone()
                    } else {
                        text
                    }
                });
                (Slot::Rendered(rendered), None)
            }
            Step::Fallback(marker) => (Slot::Rendered(Some(marker.clone())), None),
        }
    }
}

fn push_arg(input: &Slot, value: Option<Value>) -> Slot {
    let mut frames = input.frames();
    if let Some(top) = frames.last_mut() {
        top.args.push(value);
    }
    Slot::Frames(frames)
}

/// A sequence of steps evaluated arm by arm
pub trait EvalChain {
    type Output;

    /// Append a step mapping the slot of the previous step
    fn then(&mut self, step: Step);

    /// Mark the end of an arm; true if evaluation can stop here
    fn break_on_non_null(&mut self) -> bool;

    fn finish(self) -> Self::Output;
}

/// Feed the steps of one placeholder into `chain`
pub fn populate<C: EvalChain>(
    mut chain: C,
    coalesce: &CoalescePath,
    context: &Value,
    viewer: Option<&Value>,
    config: &RenderConfig,
) -> C::Output {
    for choice in &coalesce.choices {
        chain.then(Step::Begin(context.clone()));
        compile_path(&mut chain, &choice.path, context);
        chain.then(Step::Display {
            display: Arc::clone(&choice.display),
            viewer: viewer.cloned(),
            invalid_marker: config.invalid_marker.clone(),
        });
        if chain.break_on_non_null() {
            return chain.finish();
        }
    }

    let marker = if coalesce.choices.is_empty() {
        config.unresolved(&coalesce.raw)
    } else {
        config.null(&coalesce.raw)
    };
    chain.then(Step::Fallback(marker));
    chain.finish()
}

fn compile_path<C: EvalChain>(chain: &mut C, path: &ResolvedPath, context: &Value) {
    for segment in &path.segments {
        for arg in &segment.args {
            compile_arg(chain, arg, context);
        }
        chain.then(Step::Map(Arc::clone(&segment.mapping)));
    }
}

/// Every argument pushes exactly one value onto the current frame
fn compile_arg<C: EvalChain>(chain: &mut C, arg: &ResolvedArg, context: &Value) {
    match arg {
        ResolvedArg::Unset => chain.then(Step::Unset),
        ResolvedArg::Constant(value) => chain.then(Step::Const(value.clone())),
        ResolvedArg::Coalesce(paths) => {
            for (i, path) in paths.iter().enumerate() {
                let alternative = i > 0;
                chain.then(Step::PushFrame {
                    context: context.clone(),
                    alternative,
                });
                compile_path(chain, path, context);
                chain.then(Step::PopFrame { alternative });
            }
        }
        ResolvedArg::Variadic(items) => {
            for item in items {
                compile_arg(chain, item, context);
            }
            chain.then(Step::Collect(items.len()));
        }
    }
}

/// Render a bound template once
pub fn render_once(
    template: &BoundTemplate,
    context: &Value,
    viewer: Option<&Value>,
    config: &RenderConfig,
) -> String {
    template
        .elements
        .iter()
        .map(|element| match element {
            BoundElement::RawText(text) => text.clone(),
            BoundElement::Coalesce(coalesce) => {
                populate(GetChain::new(), coalesce, context, viewer, config)
            }
        })
        .collect()
}

/// Render a bound template as a stream of updated outputs
pub fn render_continuous(
    template: &BoundTemplate,
    context: &Value,
    viewer: Option<&Value>,
    config: &RenderConfig,
) -> RenderStream {
    let elements = template
        .elements
        .iter()
        .map(|element| match element {
            BoundElement::RawText(text) => stream::RenderElement::Static(text.clone()),
            BoundElement::Coalesce(coalesce) => stream::RenderElement::Chain(populate(
                WatchChain::new(),
                coalesce,
                context,
                viewer,
                config,
            )),
        })
        .collect();
    RenderStream::new(elements)
}
