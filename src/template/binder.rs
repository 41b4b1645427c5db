//! Binding - resolves every placeholder of a parsed template to mapping chains

use log::debug;

use crate::parser::ast::{Arg, ArgValue, CallChain, Element, Expr, LiteralValue, Spanned, Template};
use crate::pathfind::{self, Path};
use crate::registry::{Indices, Kind, Mapping, Parameter, QualifiedRef, Value};

use super::plan::{
    BoundElement, BoundTemplate, CoalescePath, PathWithDisplay, ResolvedArg, ResolvedPath,
    ResolvedSegment,
};

/// State shared while binding one template
#[derive(Clone, Copy)]
pub struct BindContext<'a> {
    pub indices: &'a Indices,
    /// Kind of the context value every path starts from
    pub start: &'a Kind,
}

impl<'a> BindContext<'a> {
    pub fn new(indices: &'a Indices, start: &'a Kind) -> Self {
        Self { indices, start }
    }
}

/// Bind every element of a template
///
/// Placeholders that cannot be resolved are kept with no choices so that
/// evaluation can render the unresolved marker.
pub fn bind(template: &Template, indices: &Indices, start: &Kind) -> BoundTemplate {
    let ctx = BindContext::new(indices, start);
    let elements = template
        .elements
        .iter()
        .map(|element| match &element.node {
            Element::RawText(text) => BoundElement::RawText(text.clone()),
            Element::Expr(expr) => BoundElement::Coalesce(bind_placeholder(expr, ctx)),
        })
        .collect();
    BoundTemplate { elements }
}

fn bind_placeholder(expr: &Expr, ctx: BindContext<'_>) -> CoalescePath {
    let mut choices = Vec::new();

    for arm in expr.arms() {
        let paths = {
            let displays = ctx.indices.displays.read();
            find_paths(arm, ctx, |kind| displays.can_display(kind))
        };
        let Some(path) = paths.into_iter().next() else {
            debug!("arm `{}` is unresolved from {}", arm, ctx.start);
            continue;
        };

        let Some(display) = ctx.indices.displays.read().get(&path.tail_kind).cloned() else {
            continue;
        };
        debug!("arm `{}` resolved to {} through {} hops", arm, path.tail_kind, path.cost.hops);
        choices.push(PathWithDisplay {
            path: resolve_path(arm, &path, ctx),
            display,
        });
    }

    CoalescePath {
        raw: expr.main.to_string(),
        choices,
    }
}

fn find_paths(arm: &CallChain, ctx: BindContext<'_>, accept: impl Fn(&Kind) -> bool) -> Vec<Path> {
    let calls: Vec<QualifiedRef> = arm
        .calls()
        .into_iter()
        .map(|call| call.node.name.clone())
        .collect();
    pathfind::find(ctx.indices, &calls, ctx.start, accept)
}

/// Attach the arguments written in `arm` to the hops of `path`
fn resolve_path(arm: &CallChain, path: &Path, ctx: BindContext<'_>) -> ResolvedPath {
    let calls = arm.calls();
    let segments = path
        .hops
        .iter()
        .map(|hop| {
            let written = hop
                .call
                .and_then(|index| calls.get(index))
                .and_then(|call| call.node.args.as_deref())
                .unwrap_or(&[]);
            ResolvedSegment {
                mapping: hop.mapping.clone(),
                args: bind_args(&hop.mapping, written, ctx),
            }
        })
        .collect();
    ResolvedPath { segments }
}

/// Match written arguments to the declared parameters of `mapping`
///
/// Named arguments go to the parameter with that name. Positional arguments
/// fill the remaining parameters left to right; a variadic parameter takes all
/// that are left. Unknown names and surplus arguments are dropped.
fn bind_args(
    mapping: &Mapping,
    written: &[Spanned<Arg>],
    ctx: BindContext<'_>,
) -> Vec<ResolvedArg> {
    let params = &mapping.parameters;
    let mut bound: Vec<Option<ResolvedArg>> = params.iter().map(|_| None).collect();

    for arg in written {
        let Some(name) = &arg.node.name else {
            continue;
        };
        match params.iter().position(|param| &param.name == name) {
            Some(index) if bound[index].is_none() => {
                let value = bind_value(&arg.node.value, &params[index], ctx);
                bound[index] = Some(if params[index].variadic {
                    ResolvedArg::Variadic(vec![value])
                } else {
                    value
                });
            }
            _ => debug!(
                "dropping argument `{}` of {}",
                name, mapping.qualified_name
            ),
        }
    }

    let mut positional = written.iter().filter(|arg| arg.node.name.is_none());
    for (index, param) in params.iter().enumerate() {
        if bound[index].is_some() {
            continue;
        }
        if param.variadic {
            let rest = positional
                .by_ref()
                .map(|arg| bind_value(&arg.node.value, param, ctx))
                .collect();
            bound[index] = Some(ResolvedArg::Variadic(rest));
        } else if let Some(arg) = positional.next() {
            bound[index] = Some(bind_value(&arg.node.value, param, ctx));
        }
    }

    let surplus = positional.count();
    if surplus > 0 {
        debug!(
            "dropping {} surplus arguments of {}",
            surplus, mapping.qualified_name
        );
    }

    bound
        .into_iter()
        .map(|arg| arg.unwrap_or(ResolvedArg::Unset))
        .collect()
}

fn bind_value(value: &ArgValue, param: &Parameter, ctx: BindContext<'_>) -> ResolvedArg {
    match value {
        ArgValue::Literal(literal) => ResolvedArg::Constant(match &literal.value {
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::String(s.clone()),
        }),
        ArgValue::Expr(expr) => {
            let paths: Vec<ResolvedPath> = expr
                .arms()
                .filter_map(|arm| {
                    let path = find_paths(arm, ctx, |kind| kind == &param.kind)
                        .into_iter()
                        .next()?;
                    Some(resolve_path(arm, &path, ctx))
                })
                .collect();
            if paths.is_empty() {
                debug!(
                    "argument `{}` has no path to {}",
                    expr.main, param.kind
                );
                ResolvedArg::Unset
            } else {
                ResolvedArg::Coalesce(paths)
            }
        }
    }
}
