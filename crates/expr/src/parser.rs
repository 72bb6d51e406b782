use pest::Parser;
use pest::iterators::Pair;

use crate::ast::{ArithmeticOp, ComparisonOp, Expr, Literal, LogicalOp};
use crate::error::ExprError;

#[derive(pest_derive::Parser)]
#[grammar = "expr.pest"]
pub struct ExprParser;

impl ExprParser {
    /// Parse `input` into an AST. An empty input is the empty sequence.
    pub fn parse_to_ast(input: &str) -> Result<Expr, ExprError> {
        let mut pairs = Self::parse(Rule::expression, input).map_err(|e| ExprError::Syntax(Box::new(e)))?;
        let Some(root) = pairs.next() else {
            return Ok(Expr::Sequence(Vec::new()));
        };
        match root.into_inner().find(|p| p.as_rule() == Rule::sequence_expr) {
            Some(sequence) => Ok(build(sequence)),
            None => Ok(Expr::Sequence(Vec::new())),
        }
    }
}

fn build(pair: Pair<'_, Rule>) -> Expr {
    match pair.as_rule() {
        Rule::sequence_expr => {
            let mut items: Vec<Expr> = pair.into_inner().map(build).collect();
            if items.len() == 1 { items.remove(0) } else { Expr::Sequence(items) }
        }
        Rule::parenthesized => match pair.into_inner().next() {
            Some(inner) => build(inner),
            None => Expr::Sequence(Vec::new()),
        },
        Rule::if_expr => {
            let mut operands = pair.into_inner().filter(|p| !is_keyword(p.as_rule())).map(build);
            let condition = operands.next().unwrap_or(Expr::Sequence(Vec::new()));
            let then_branch = operands.next().unwrap_or(Expr::Sequence(Vec::new()));
            let else_branch = operands.next().unwrap_or(Expr::Sequence(Vec::new()));
            Expr::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }
        }
        Rule::or_expr | Rule::and_expr => {
            let op = if pair.as_rule() == Rule::or_expr { LogicalOp::Or } else { LogicalOp::And };
            fold_chain(pair, |_, left, right| Expr::Logical { op, left, right })
        }
        Rule::additive_expr | Rule::multiplicative_expr => fold_chain(pair, |op, left, right| Expr::Arithmetic {
            op: arithmetic_op(op),
            left,
            right,
        }),
        Rule::comparison_expr => fold_chain(pair, |op, left, right| Expr::Comparison {
            op: comparison_op(op),
            left,
            right,
        }),
        Rule::range_expr => fold_chain(pair, |_, from, to| Expr::Range { from, to }),
        Rule::unary_expr => {
            let mut negations = 0usize;
            let mut operand = None;
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::minus {
                    negations += 1;
                } else {
                    operand = Some(build(inner));
                }
            }
            let mut expr = operand.unwrap_or(Expr::Sequence(Vec::new()));
            for _ in 0..negations {
                expr = Expr::Negate(Box::new(expr));
            }
            expr
        }
        Rule::function_call => {
            let mut inner = pair.into_inner();
            let name = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            Expr::FunctionCall { name, args: inner.map(build).collect() }
        }
        Rule::var_ref => {
            let name = pair.into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default();
            Expr::Variable(name)
        }
        Rule::bare_name => match pair.as_str() {
            "true" => Expr::Literal(Literal::Boolean(true)),
            "false" => Expr::Literal(Literal::Boolean(false)),
            name => Expr::Variable(name.to_string()),
        },
        Rule::integer_literal => match pair.as_str().parse::<i64>() {
            Ok(v) => Expr::Literal(Literal::Integer(v)),
            Err(_) => Expr::Literal(Literal::Double(pair.as_str().parse::<f64>().unwrap_or(f64::INFINITY))),
        },
        Rule::double_literal => Expr::Literal(Literal::Double(pair.as_str().parse::<f64>().unwrap_or(f64::NAN))),
        Rule::string_literal => {
            let Some(content) = pair.into_inner().next() else {
                return Expr::Literal(Literal::String(String::new()));
            };
            let raw = content.as_str();
            let value = match content.as_rule() {
                Rule::dbl_string_inner => raw.replace("\"\"", "\""),
                Rule::sgl_string_inner => raw.replace("''", "'"),
                _ => raw.to_string(),
            };
            Expr::Literal(Literal::String(value))
        }
        _ => {
            // Any remaining wrapper rule has exactly one meaningful child.
            match pair.into_inner().next() {
                Some(inner) => build(inner),
                None => Expr::Sequence(Vec::new()),
            }
        }
    }
}

/// Left-folds `operand (op operand)*` chains; single operands pass through untouched.
fn fold_chain(pair: Pair<'_, Rule>, combine: impl Fn(&str, Box<Expr>, Box<Expr>) -> Expr) -> Expr {
    let mut inner = pair.into_inner();
    let mut expr = match inner.next() {
        Some(first) => build(first),
        None => return Expr::Sequence(Vec::new()),
    };
    while let Some(op) = inner.next() {
        let Some(right) = inner.next() else { break };
        expr = combine(op.as_str().trim(), Box::new(expr), Box::new(build(right)));
    }
    expr
}

fn is_keyword(rule: Rule) -> bool {
    matches!(rule, Rule::k_if | Rule::k_then | Rule::k_else)
}

fn arithmetic_op(token: &str) -> ArithmeticOp {
    match token {
        "+" => ArithmeticOp::Add,
        "-" => ArithmeticOp::Sub,
        "*" => ArithmeticOp::Mul,
        "div" => ArithmeticOp::Div,
        _ => ArithmeticOp::Mod,
    }
}

fn comparison_op(token: &str) -> ComparisonOp {
    match token {
        "=" => ComparisonOp::Eq,
        "!=" => ComparisonOp::Ne,
        "<" => ComparisonOp::Lt,
        "<=" => ComparisonOp::Le,
        ">" => ComparisonOp::Gt,
        _ => ComparisonOp::Ge,
    }
}
