use std::sync::Arc;

use confpp_xml::{Element, Node};
use tracing::trace;

use crate::dispatch::{Context, Expander};
use crate::error::PreprocessError;
use crate::validate::require_attributes;

/// `define name="n"` captures its body as a template; without `name`, every
/// attribute becomes a text symbol.
pub fn define_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    _: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    define(ex, element)?;
    Ok(Vec::new())
}

fn define(ex: &mut Expander<'_>, element: &Element) -> Result<(), PreprocessError> {
    if let Some(name) = element.attribute("name") {
        ex.env.define_nodes(name, Arc::<[Node]>::from(element.children()));
        return Ok(());
    }
    for (name, value) in interpolated_attributes(ex, element)? {
        ex.env.define_text(name, value);
    }
    Ok(())
}

/// `eval`: expression result, re-expanded.
pub fn eval_directive(ex: &mut Expander<'_>, element: &Element, ctx: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
    let [expr] = require_attributes(element, ["expr"])?;
    let expr = ex.interpolate_string(expr)?;
    let nodes = ex.eval_expr_nodes(&expr, ctx.whitespace)?;
    ex.descend(|ex| ex.expand_nodes(&nodes, ctx.whitespace))
}

/// Any unregistered preprocessor element: expands the symbol named by its
/// local name, with the element's attributes and `define` children bound as
/// arguments.
pub fn invoke(ex: &mut Expander<'_>, element: &Element, ctx: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
    let name = element.name.local.as_str();
    if !ex.env.is_defined(name) {
        return Err(PreprocessError::UndefinedSymbol(name.to_string()));
    }
    let arguments = interpolated_attributes(ex, element)?;
    trace!(symbol = %name, arguments = arguments.len(), "invoke");
    ex.call(|ex| {
        for (arg, value) in arguments {
            ex.env.define_text(arg, value);
        }
        for child in element.child_elements() {
            if ex.is_directive(child, "define") {
                define(ex, child)?;
            }
        }
        ex.eval_symbol(name, ctx.whitespace)
    })
}

fn interpolated_attributes(ex: &mut Expander<'_>, element: &Element) -> Result<Vec<(String, String)>, PreprocessError> {
    let mut out = Vec::new();
    for attr in element.plain_attributes() {
        out.push((attr.name.local.clone(), ex.interpolate_string(&attr.value)?));
    }
    Ok(out)
}
