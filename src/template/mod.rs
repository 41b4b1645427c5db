//! Template binding
//!
//! Binding turns a parsed [`Template`](crate::parser::Template) into a
//! [`BoundTemplate`]: each placeholder arm is resolved by the pathfinder to a
//! chain of mappings ending in a displayable kind, and the arguments written
//! in the template are attached to the parameters of those mappings.
//!
//! # Example
//!
//! ```text
//! // Context kind: player
//! Hello {nick | name}, you are in {position world name}
//! ```
//!
//! Plans are built fresh from the live indices on every bind, so mappings
//! registered later are picked up by the next render.

mod binder;
mod plan;

pub use binder::{bind, BindContext};
pub use plan::{
    BoundElement, BoundTemplate, CoalescePath, PathWithDisplay, ResolvedArg, ResolvedPath,
    ResolvedSegment,
};
