use std::sync::Arc;

use confpp_xml::{Element, Node};
use tracing::trace;

use crate::dispatch::{Context, Expander};
use crate::error::PreprocessError;
use crate::validate::require_attributes;

pub fn if_directive(ex: &mut Expander<'_>, element: &Element, ctx: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
    let [expr] = require_attributes(element, ["expr"])?;
    let expr = ex.interpolate_string(expr)?;
    let condition = ex.eval_bool(&expr, ctx.whitespace)?;
    branch(ex, element, ctx, condition)
}

pub fn ifdef_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name] = require_attributes(element, ["name"])?;
    let condition = ex.env.is_defined(name);
    branch(ex, element, ctx, condition)
}

pub fn ifndef_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name] = require_attributes(element, ["name"])?;
    let condition = !ex.env.is_defined(name);
    branch(ex, element, ctx, condition)
}

/// Consumed through the preceding conditional; on its own it expands to nothing.
pub fn else_directive(_: &mut Expander<'_>, _: &Element, _: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
    Ok(Vec::new())
}

fn branch(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
    condition: bool,
) -> Result<Vec<Node>, PreprocessError> {
    trace!(directive = %element.name.local, condition, "conditional");
    if condition {
        return ex.expand_children(element, ctx.whitespace);
    }
    match else_sibling(ex, ctx.following) {
        Some(otherwise) => ex.expand_children(otherwise, ctx.whitespace),
        None => Ok(Vec::new()),
    }
}

/// The `else` element following a conditional, skipping blank text and comments.
fn else_sibling<'n>(ex: &Expander<'_>, following: &'n [Node]) -> Option<&'n Arc<Element>> {
    following
        .iter()
        .find(|node| !node.is_blank_text() && !matches!(node, Node::Comment(_)))
        .and_then(Node::as_element)
        .filter(|candidate| ex.is_directive(candidate, "else"))
}
