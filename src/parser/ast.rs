//! Abstract Syntax Tree types for templates

use std::fmt;

use crate::registry::QualifiedRef;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Root AST node - a parsed template string
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub elements: Vec<Spanned<Element>>,
}

impl Template {
    /// Whether the template contains no placeholders
    pub fn is_static(&self) -> bool {
        self.elements
            .iter()
            .all(|e| matches!(e.node, Element::RawText(_)))
    }
}

/// Top-level piece of a template
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Literal text with escapes already decoded
    RawText(String),
    /// A `{...}` placeholder
    Expr(Expr),
}

/// A coalescing chain: `main | else`
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// The arm tried first
    pub main: CallChain,
    /// The next alternative if `main` is unresolved or yields no value
    pub else_: Option<Box<Expr>>,
}

impl Expr {
    /// Build a right-nested coalescing chain from its arms in source order
    ///
    /// Returns None for an empty list.
    pub fn from_arms(arms: Vec<CallChain>) -> Option<Self> {
        arms.into_iter().rev().fold(None, |else_, main| {
            Some(Expr {
                main,
                else_: else_.map(Box::new),
            })
        })
    }

    /// Iterate over the arms, main first
    pub fn arms(&self) -> impl Iterator<Item = &CallChain> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let expr = next?;
            next = expr.else_.as_deref();
            Some(&expr.main)
        })
    }
}

/// A chain of calls where each call maps the result of its parent
///
/// `a b c` is represented as `c` with parent `b` with parent `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallChain {
    pub parent: Option<Box<CallChain>>,
    pub call: Spanned<MappingCall>,
}

impl CallChain {
    /// Build a chain from calls in source order
    pub fn from_calls(calls: Vec<Spanned<MappingCall>>) -> Option<Self> {
        calls.into_iter().fold(None, |parent, call| {
            Some(CallChain {
                parent: parent.map(Box::new),
                call,
            })
        })
    }

    /// Calls in source order, outermost parent first
    pub fn calls(&self) -> Vec<&Spanned<MappingCall>> {
        let mut calls = match &self.parent {
            Some(parent) => parent.calls(),
            None => Vec::new(),
        };
        calls.push(&self.call);
        calls
    }
}

impl fmt::Display for CallChain {
    /// Call names separated by spaces, without arguments
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .calls()
            .iter()
            .map(|call| call.node.name.to_string())
            .collect();
        write!(f, "{}", names.join(" "))
    }
}

/// A reference to a mapping with optional arguments: `a:b(c, d = e)`
#[derive(Debug, Clone, PartialEq)]
pub struct MappingCall {
    pub name: QualifiedRef,
    /// None when written without parentheses
    pub args: Option<Vec<Spanned<Arg>>>,
}

/// An argument passed to a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Parameter name for `name = value` arguments
    pub name: Option<String>,
    pub value: ArgValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Literal(Literal),
    Expr(Expr),
}

/// A constant argument
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    /// The literal as written in the template
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Number(f64),
    String(String),
}
