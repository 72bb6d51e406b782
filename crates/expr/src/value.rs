use core::fmt;

use confpp_xml::Node;
use smallvec::SmallVec;

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Node(Node),
}

impl Value {
    pub fn string_value(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Double(d) => format_double(*d),
            Value::String(s) => s.clone(),
            Value::Node(n) => n.string_value(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }

    /// Nodes atomise to their string value; everything else is already atomic.
    pub fn atomize(&self) -> Value {
        match self {
            Value::Node(n) => Value::String(n.string_value()),
            other => other.clone(),
        }
    }

    /// Numeric view used by comparisons; unparsable strings become NaN.
    pub fn to_double(&self) -> f64 {
        match self {
            Value::Boolean(b) => f64::from(u8::from(*b)),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(i) => *i as f64,
            Value::Double(d) => *d,
            Value::String(_) | Value::Node(_) => {
                parse_number(&self.string_value()).map_or(f64::NAN, |n| n.to_double())
            }
        }
    }

    /// Strict numeric conversion used by arithmetic.
    pub fn to_number(&self) -> Result<Value, ExprError> {
        match self {
            Value::Integer(_) | Value::Double(_) => Ok(self.clone()),
            Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
            Value::String(_) | Value::Node(_) => {
                let text = self.string_value();
                parse_number(&text).ok_or_else(|| ExprError::Type(format!("cannot convert '{text}' to a number")))
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Node(_) => "node",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_value())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(value)
    }
}

/// Parses trimmed decimal text as an integer when possible, otherwise as a double.
pub fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    let looks_decimal = text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if looks_decimal && let Ok(d) = text.parse::<f64>() {
        return Some(Value::Double(d));
    }
    None
}

pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF".to_string() } else { "-INF".to_string() };
    }
    if d.fract() == 0.0 && d.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        return (d as i64).to_string();
    }
    d.to_string()
}

/// Ordered result of an evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence(SmallVec<[Value; 1]>);

impl Sequence {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn one(value: impl Into<Value>) -> Self {
        let mut items = SmallVec::new();
        items.push(value.into());
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, other: Sequence) {
        self.0.extend(other.0);
    }

    /// Effective boolean value.
    pub fn effective_boolean(&self) -> Result<bool, ExprError> {
        match self.0.as_slice() {
            [] => Ok(false),
            [Value::Node(_), ..] => Ok(true),
            [single] => Ok(match single {
                Value::Boolean(b) => *b,
                Value::String(s) => !s.is_empty(),
                Value::Integer(i) => *i != 0,
                Value::Double(d) => *d != 0.0 && !d.is_nan(),
                Value::Node(_) => true,
            }),
            _ => Err(ExprError::Type(format!(
                "effective boolean value of a sequence of {} atomic values is undefined",
                self.0.len()
            ))),
        }
    }

    /// Space-free concatenation of every item's string value.
    pub fn string_value(&self) -> String {
        self.0.iter().map(Value::string_value).collect()
    }

    /// The single item, the empty sequence as `None`, or a type error.
    pub fn single(&self, what: &str) -> Result<Option<&Value>, ExprError> {
        match self.0.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(one)),
            many => Err(ExprError::Type(format!("{what} expects at most one item, got {}", many.len()))),
        }
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(values: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Sequence {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = core::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
