use std::sync::Arc;

use confpp_expr::Value;
use confpp_xml::{Element, Node};
use tracing::debug;

use crate::dispatch::{Context, Expander, append};
use crate::error::PreprocessError;
use crate::validate::require_attributes;

/// `count`: body repeated with `name` bound to 1..=max.
pub fn count_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name, max] = require_attributes(element, ["name", "max"])?;
    let max_text = ex.interpolate_string(max)?;
    let max = max_text.trim().parse::<u64>().map_err(|_| PreprocessError::InvalidExpression {
        expr: max_text.clone(),
        reason: "max must be a non-negative integer".to_string(),
    })?;

    let mut out = Vec::new();
    for idx in 1..=max {
        let body = ex.call(|ex| {
            ex.env.define_text(name, idx.to_string());
            ex.expand_children(element, ctx.whitespace)
        })?;
        append(&mut out, body);
    }
    debug!(%name, iterations = max, "count loop");
    Ok(out)
}

/// `for`: C-style loop over an integer counter.
pub fn for_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [counter, init, test, step] =
        require_attributes(element, ["counter-name", "init-expr", "test-expr", "count-expr"])?;
    let init = ex.interpolate_string(init)?;
    let mut current = ex.eval_integer(&init, ctx.whitespace)?;
    let limit = ex.options.max_iterations();

    let mut out = Vec::new();
    let mut iterations = 0usize;
    loop {
        let iteration = ex.call(|ex| {
            ex.env.define_text(counter, current.to_string());
            let test = ex.interpolate_string(test)?;
            if !ex.eval_bool(&test, ctx.whitespace)? {
                return Ok(None);
            }
            if iterations >= limit {
                return Err(PreprocessError::IterationLimit(limit));
            }
            let body = ex.expand_children(element, ctx.whitespace)?;
            // The step sees bindings made by the body, so it runs before the frame closes.
            let step = ex.interpolate_string(step)?;
            let next = ex.eval_integer(&step, ctx.whitespace)?;
            Ok(Some((body, next)))
        })?;
        let Some((body, next)) = iteration else { break };
        append(&mut out, body);
        current = next;
        iterations += 1;
    }
    debug!(%counter, iterations, "for loop");
    Ok(out)
}

/// `for-each`: body once per item of an expression result.
pub fn for_each_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name, expr] = require_attributes(element, ["iterator-name", "iterator-expr"])?;
    let expr = ex.interpolate_string(expr)?;
    let items = ex.eval_expr(&expr, ctx.whitespace)?;
    let count = items.len();

    let mut out = Vec::new();
    for item in items {
        let body = ex.call(|ex| {
            match &item {
                Value::Node(Node::Element(container)) => {
                    ex.env.define_nodes(name, Arc::<[Node]>::from(container.children()));
                }
                other => ex.env.define_text(name, other.string_value()),
            }
            ex.expand_children(element, ctx.whitespace)
        })?;
        append(&mut out, body);
    }
    debug!(%name, iterations = count, "for-each loop");
    Ok(out)
}
