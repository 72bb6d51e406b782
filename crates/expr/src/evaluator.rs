use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::ast::{ArithmeticOp, ComparisonOp, Expr, Literal, LogicalOp};
use crate::error::ExprError;
use crate::functions;
use crate::parser::ExprParser;
use crate::value::{Sequence, Value};

/// Upper bound on the size of a `to` range.
const MAX_RANGE: i64 = 1_000_000;

/// Variable bindings visible to one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Sequence>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Sequence) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Sequence) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Sequence> {
        self.values.get(name)
    }
}

/// A parsed expression; cheap to clone and reuse across evaluations.
#[derive(Debug, Clone)]
pub struct Expression {
    source: Arc<str>,
    ast: Arc<Expr>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let ast = ExprParser::parse_to_ast(source)?;
        Ok(Self { source: Arc::from(source), ast: Arc::new(ast) })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Referenced variable names, de-duplicated, in first-use order.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.ast.visit_variables(&mut |name| {
            if !names.contains(&name) {
                names.push(name);
            }
        });
        names
    }

    pub fn evaluate(&self, variables: &Variables) -> Result<Sequence, ExprError> {
        trace!(expr = %self.source, "evaluating expression");
        eval(&self.ast, variables)
    }

    pub fn evaluate_bool(&self, variables: &Variables) -> Result<bool, ExprError> {
        self.evaluate(variables)?.effective_boolean()
    }

    pub fn evaluate_string(&self, variables: &Variables) -> Result<String, ExprError> {
        Ok(self.evaluate(variables)?.string_value())
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn eval(expr: &Expr, vars: &Variables) -> Result<Sequence, ExprError> {
    match expr {
        Expr::Literal(Literal::Boolean(b)) => Ok(Sequence::one(*b)),
        Expr::Literal(Literal::Integer(i)) => Ok(Sequence::one(*i)),
        Expr::Literal(Literal::Double(d)) => Ok(Sequence::one(Value::Double(*d))),
        Expr::Literal(Literal::String(s)) => Ok(Sequence::one(s.as_str())),
        Expr::Variable(name) => vars.get(name).cloned().ok_or_else(|| ExprError::UndefinedVariable(name.clone())),
        Expr::Sequence(items) => {
            let mut out = Sequence::empty();
            for item in items {
                out.extend(eval(item, vars)?);
            }
            Ok(out)
        }
        Expr::If { condition, then_branch, else_branch } => {
            if eval(condition, vars)?.effective_boolean()? {
                eval(then_branch, vars)
            } else {
                eval(else_branch, vars)
            }
        }
        Expr::Logical { op, left, right } => {
            let left = eval(left, vars)?.effective_boolean()?;
            let result = match op {
                LogicalOp::And => left && eval(right, vars)?.effective_boolean()?,
                LogicalOp::Or => left || eval(right, vars)?.effective_boolean()?,
            };
            Ok(Sequence::one(result))
        }
        Expr::Comparison { op, left, right } => {
            let left = eval(left, vars)?;
            let right = eval(right, vars)?;
            Ok(Sequence::one(general_compare(*op, &left, &right)))
        }
        Expr::Range { from, to } => {
            let (Some(from), Some(to)) = (integer_operand(&eval(from, vars)?)?, integer_operand(&eval(to, vars)?)?)
            else {
                return Ok(Sequence::empty());
            };
            if to.saturating_sub(from) >= MAX_RANGE {
                return Err(ExprError::Type(format!("range {from} to {to} exceeds {MAX_RANGE} items")));
            }
            Ok((from..=to).map(Value::Integer).collect())
        }
        Expr::Arithmetic { op, left, right } => {
            let left = eval(left, vars)?;
            let right = eval(right, vars)?;
            let (Some(l), Some(r)) = (left.single("arithmetic")?, right.single("arithmetic")?) else {
                return Ok(Sequence::empty());
            };
            Ok(Sequence::one(arithmetic(*op, &l.to_number()?, &r.to_number()?)?))
        }
        Expr::Negate(inner) => {
            let value = eval(inner, vars)?;
            let Some(v) = value.single("negation")? else {
                return Ok(Sequence::empty());
            };
            let negated = match v.to_number()? {
                Value::Integer(i) => i.checked_neg().map_or(Value::Double(-(i as f64)), Value::Integer),
                other => Value::Double(-other.to_double()),
            };
            Ok(Sequence::one(negated))
        }
        Expr::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, vars)?);
            }
            functions::call(name, &evaluated)
        }
    }
}

fn integer_operand(seq: &Sequence) -> Result<Option<i64>, ExprError> {
    match seq.single("range")? {
        None => Ok(None),
        Some(v) => match v.to_number()? {
            Value::Integer(i) => Ok(Some(i)),
            other => Err(ExprError::Type(format!("range bound {other} is not an integer"))),
        },
    }
}

/// Existential comparison over both sequences.
pub(crate) fn general_compare(op: ComparisonOp, left: &Sequence, right: &Sequence) -> bool {
    left.iter().any(|a| right.iter().any(|b| compare_values(op, &a.atomize(), &b.atomize())))
}

fn compare_values(op: ComparisonOp, a: &Value, b: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = if a.is_numeric() || b.is_numeric() {
        a.to_double().partial_cmp(&b.to_double())
    } else if matches!(a, Value::Boolean(_)) || matches!(b, Value::Boolean(_)) {
        Some(as_boolean(a).cmp(&as_boolean(b)))
    } else if matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
        Some(a.string_value().cmp(&b.string_value()))
    } else {
        // Relational operators on two strings: numeric when both look numeric, lexical otherwise.
        let (x, y) = (a.to_double(), b.to_double());
        if x.is_nan() || y.is_nan() { Some(a.string_value().cmp(&b.string_value())) } else { x.partial_cmp(&y) }
    };

    match (op, ordering) {
        (ComparisonOp::Ne, None) => true,
        (_, None) => false,
        (ComparisonOp::Eq, Some(o)) => o == Ordering::Equal,
        (ComparisonOp::Ne, Some(o)) => o != Ordering::Equal,
        (ComparisonOp::Lt, Some(o)) => o == Ordering::Less,
        (ComparisonOp::Le, Some(o)) => o != Ordering::Greater,
        (ComparisonOp::Gt, Some(o)) => o == Ordering::Greater,
        (ComparisonOp::Ge, Some(o)) => o != Ordering::Less,
    }
}

fn as_boolean(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::String(s) => !s.is_empty(),
        other => other.to_double() != 0.0,
    }
}

#[allow(clippy::cast_precision_loss)]
fn arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Value::Integer(l), Value::Integer(r)) = (left, right) {
        let (l, r) = (*l, *r);
        let exact = match op {
            ArithmeticOp::Add => l.checked_add(r),
            ArithmeticOp::Sub => l.checked_sub(r),
            ArithmeticOp::Mul => l.checked_mul(r),
            ArithmeticOp::Div => {
                if r == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                match l.checked_rem(r) {
                    Some(0) => l.checked_div(r),
                    Some(_) => return Ok(Value::Double(l as f64 / r as f64)),
                    None => None,
                }
            }
            ArithmeticOp::Mod => {
                if r == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                l.checked_rem(r)
            }
        };
        if let Some(v) = exact {
            return Ok(Value::Integer(v));
        }
    }
    let (l, r) = (left.to_double(), right.to_double());
    Ok(Value::Double(match op {
        ArithmeticOp::Add => l + r,
        ArithmeticOp::Sub => l - r,
        ArithmeticOp::Mul => l * r,
        ArithmeticOp::Div => l / r,
        ArithmeticOp::Mod => l % r,
    }))
}
