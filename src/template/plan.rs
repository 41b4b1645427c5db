//! Resolution plans produced by binding a template against indices

use std::sync::Arc;

use crate::registry::{Display, Mapping, Value};

/// A template whose placeholders have been resolved to mapping chains
#[derive(Debug, Clone, Default)]
pub struct BoundTemplate {
    pub elements: Vec<BoundElement>,
}

impl BoundTemplate {
    /// Whether any placeholder may change over time
    pub fn is_mutable(&self) -> bool {
        self.elements.iter().any(|element| match element {
            BoundElement::RawText(_) => false,
            BoundElement::Coalesce(coalesce) => coalesce
                .choices
                .iter()
                .any(|choice| choice.path.is_mutable()),
        })
    }
}

#[derive(Debug, Clone)]
pub enum BoundElement {
    RawText(String),
    Coalesce(CoalescePath),
}

/// The resolved arms of one placeholder
#[derive(Debug, Clone)]
pub struct CoalescePath {
    /// Call names of the main arm joined by spaces, for error markers
    pub raw: String,
    /// Arms that have a path, in source order; empty if none resolved
    pub choices: Vec<PathWithDisplay>,
}

#[derive(Debug, Clone)]
pub struct PathWithDisplay {
    pub path: ResolvedPath,
    pub display: Arc<Display>,
}

/// A non-empty chain of mappings applied to the context
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub segments: Vec<ResolvedSegment>,
}

impl ResolvedPath {
    pub fn is_mutable(&self) -> bool {
        self.segments.iter().any(|segment| {
            segment.mapping.is_mutable() || segment.args.iter().any(ResolvedArg::is_mutable)
        })
    }
}

/// One mapping with its arguments, one per declared parameter
#[derive(Debug, Clone)]
pub struct ResolvedSegment {
    pub mapping: Arc<Mapping>,
    pub args: Vec<ResolvedArg>,
}

#[derive(Debug, Clone)]
pub enum ResolvedArg {
    /// Evaluates to no value
    Unset,
    Constant(Value),
    /// Alternatives evaluated from the context, first with a value wins
    Coalesce(Vec<ResolvedPath>),
    /// Every remaining positional argument of a variadic parameter
    Variadic(Vec<ResolvedArg>),
}

impl ResolvedArg {
    fn is_mutable(&self) -> bool {
        match self {
            ResolvedArg::Unset | ResolvedArg::Constant(_) => false,
            ResolvedArg::Coalesce(paths) => paths.iter().any(ResolvedPath::is_mutable),
            ResolvedArg::Variadic(items) => items.iter().any(ResolvedArg::is_mutable),
        }
    }
}
