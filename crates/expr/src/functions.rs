use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::ExprError;
use crate::value::{Sequence, Value};

type FunctionImpl = fn(&[Sequence]) -> Result<Sequence, ExprError>;

struct FunctionDef {
    min: usize,
    max: Option<usize>,
    arity_text: &'static str,
    func: FunctionImpl,
}

static FUNCTIONS: LazyLock<HashMap<&'static str, FunctionDef>> = LazyLock::new(|| {
    let mut reg = HashMap::new();
    macro_rules! reg {
        ($name:literal, $min:expr, $max:expr, $text:literal, $func:expr) => {
            reg.insert($name, FunctionDef { min: $min, max: $max, arity_text: $text, func: $func });
        };
    }
    reg!("true", 0, Some(0), "0", |_| Ok(Sequence::one(true)));
    reg!("false", 0, Some(0), "0", |_| Ok(Sequence::one(false)));
    reg!("not", 1, Some(1), "1", not_fn);
    reg!("boolean", 1, Some(1), "1", boolean_fn);
    reg!("string", 1, Some(1), "1", string_fn);
    reg!("number", 1, Some(1), "1", number_fn);
    reg!("concat", 2, None, "2 or more", concat_fn);
    reg!("contains", 2, Some(2), "2", contains_fn);
    reg!("starts-with", 2, Some(2), "2", starts_with_fn);
    reg!("ends-with", 2, Some(2), "2", ends_with_fn);
    reg!("string-length", 1, Some(1), "1", string_length_fn);
    reg!("substring", 2, Some(3), "2 or 3", substring_fn);
    reg!("substring-before", 2, Some(2), "2", substring_before_fn);
    reg!("substring-after", 2, Some(2), "2", substring_after_fn);
    reg!("upper-case", 1, Some(1), "1", |args| Ok(Sequence::one(string_arg(args, 0).to_uppercase())));
    reg!("lower-case", 1, Some(1), "1", |args| Ok(Sequence::one(string_arg(args, 0).to_lowercase())));
    reg!("normalize-space", 1, Some(1), "1", normalize_space_fn);
    reg!("replace", 3, Some(3), "3", replace_fn);
    reg!("tokenize", 1, Some(2), "1 or 2", tokenize_fn);
    reg!("string-join", 1, Some(2), "1 or 2", string_join_fn);
    reg!("count", 1, Some(1), "1", count_fn);
    reg!("sum", 1, Some(1), "1", sum_fn);
    reg!("min", 1, Some(1), "1", |args| extremum(&args[0], std::cmp::Ordering::Less));
    reg!("max", 1, Some(1), "1", |args| extremum(&args[0], std::cmp::Ordering::Greater));
    reg!("empty", 1, Some(1), "1", |args| Ok(Sequence::one(args[0].is_empty())));
    reg!("exists", 1, Some(1), "1", |args| Ok(Sequence::one(!args[0].is_empty())));
    reg!("floor", 1, Some(1), "1", |args| rounding(&args[0], f64::floor));
    reg!("ceiling", 1, Some(1), "1", |args| rounding(&args[0], f64::ceil));
    reg!("round", 1, Some(1), "1", |args| rounding(&args[0], |d| (d + 0.5).floor()));
    reg!("abs", 1, Some(1), "1", abs_fn);
    reg
});

/// Calls the built-in `name` with already-evaluated arguments.
pub fn call(name: &str, args: &[Sequence]) -> Result<Sequence, ExprError> {
    let def = FUNCTIONS.get(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
    if args.len() < def.min || def.max.is_some_and(|max| args.len() > max) {
        return Err(ExprError::Arity { name: name.to_string(), expected: def.arity_text, found: args.len() });
    }
    (def.func)(args)
}

pub fn is_builtin(name: &str) -> bool {
    FUNCTIONS.contains_key(name)
}

fn string_arg(args: &[Sequence], index: usize) -> String {
    args.get(index).map(Sequence::string_value).unwrap_or_default()
}

fn not_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(!args[0].effective_boolean()?))
}

fn boolean_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(args[0].effective_boolean()?))
}

fn string_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(match args[0].single("string()")? {
        None => Sequence::one(""),
        Some(v) => Sequence::one(v.string_value()),
    })
}

fn number_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let value = match args[0].single("number()")? {
        None => f64::NAN,
        Some(v) => v.atomize().to_double(),
    };
    Ok(Sequence::one(Value::Double(value)))
}

fn concat_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(args.iter().map(Sequence::string_value).collect::<String>()))
}

fn contains_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(string_arg(args, 0).contains(&string_arg(args, 1))))
}

fn starts_with_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(string_arg(args, 0).starts_with(&string_arg(args, 1))))
}

fn ends_with_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(string_arg(args, 0).ends_with(&string_arg(args, 1))))
}

#[allow(clippy::cast_possible_wrap)]
fn string_length_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(string_arg(args, 0).chars().count() as i64))
}

/// One-based, rounded start and length over characters.
#[allow(clippy::cast_precision_loss)]
fn substring_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let text = string_arg(args, 0);
    let start = numeric_arg(&args[1], "substring()")?.round();
    let end = match args.get(2) {
        Some(len) => start + numeric_arg(len, "substring()")?.round(),
        None => f64::INFINITY,
    };
    let out: String = text
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i + 1) as f64;
            pos >= start && pos < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Sequence::one(out))
}

fn substring_before_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let (text, needle) = (string_arg(args, 0), string_arg(args, 1));
    let out = text.find(&needle).map_or("", |idx| &text[..idx]);
    Ok(Sequence::one(out))
}

fn substring_after_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let (text, needle) = (string_arg(args, 0), string_arg(args, 1));
    let out = text.find(&needle).map_or("", |idx| &text[idx + needle.len()..]);
    Ok(Sequence::one(out))
}

fn normalize_space_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(string_arg(args, 0).split_whitespace().collect::<Vec<_>>().join(" ")))
}

/// Literal (non-regex) replacement of every occurrence.
fn replace_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let (text, pattern, replacement) = (string_arg(args, 0), string_arg(args, 1), string_arg(args, 2));
    if pattern.is_empty() {
        return Err(ExprError::Type("replace() pattern must not be empty".to_string()));
    }
    Ok(Sequence::one(text.replace(&pattern, &replacement)))
}

fn tokenize_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let text = string_arg(args, 0);
    let tokens: Vec<Value> = match args.get(1) {
        None => text.split_whitespace().map(Value::from).collect(),
        Some(sep) => {
            let sep = sep.string_value();
            if sep.is_empty() {
                return Err(ExprError::Type("tokenize() separator must not be empty".to_string()));
            }
            if text.is_empty() { Vec::new() } else { text.split(sep.as_str()).map(Value::from).collect() }
        }
    };
    Ok(Sequence::from(tokens))
}

fn string_join_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let separator = string_arg(args, 1);
    let parts: Vec<String> = args[0].iter().map(Value::string_value).collect();
    Ok(Sequence::one(parts.join(&separator)))
}

#[allow(clippy::cast_possible_wrap)]
fn count_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    Ok(Sequence::one(args[0].len() as i64))
}

fn sum_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    let mut int_total: Option<i64> = Some(0);
    let mut total = 0.0;
    for item in &args[0] {
        let number = item.atomize().to_number()?;
        total += number.to_double();
        int_total = match (int_total, &number) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            _ => None,
        };
    }
    Ok(Sequence::one(int_total.map_or(Value::Double(total), Value::Integer)))
}

fn extremum(seq: &Sequence, wanted: std::cmp::Ordering) -> Result<Sequence, ExprError> {
    let mut best: Option<Value> = None;
    for item in seq {
        let number = item.atomize().to_number()?;
        best = match best {
            Some(current) if number.to_double().partial_cmp(&current.to_double()) != Some(wanted) => Some(current),
            _ => Some(number),
        };
    }
    Ok(best.map_or_else(Sequence::empty, Sequence::one))
}

fn numeric_arg(seq: &Sequence, what: &str) -> Result<f64, ExprError> {
    match seq.single(what)? {
        None => Ok(f64::NAN),
        Some(v) => Ok(v.atomize().to_number()?.to_double()),
    }
}

fn rounding(seq: &Sequence, op: fn(f64) -> f64) -> Result<Sequence, ExprError> {
    match seq.single("rounding")? {
        None => Ok(Sequence::empty()),
        Some(v) => match v.atomize().to_number()? {
            Value::Integer(i) => Ok(Sequence::one(i)),
            other => Ok(Sequence::one(Value::Double(op(other.to_double())))),
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn abs_fn(args: &[Sequence]) -> Result<Sequence, ExprError> {
    match args[0].single("abs()")? {
        None => Ok(Sequence::empty()),
        Some(v) => match v.atomize().to_number()? {
            Value::Integer(i) => {
                Ok(Sequence::one(i.checked_abs().map_or(Value::Double(i.unsigned_abs() as f64), Value::Integer)))
            }
            other => Ok(Sequence::one(Value::Double(other.to_double().abs()))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn s(text: &str) -> Sequence {
        Sequence::one(text)
    }

    #[rstest]
    fn unknown_function_is_reported() {
        assert!(matches!(call("frobnicate", &[]), Err(ExprError::UnknownFunction(name)) if name == "frobnicate"));
    }

    #[rstest]
    #[case("not", 0)]
    #[case("concat", 1)]
    #[case("substring", 4)]
    fn arity_is_checked(#[case] name: &str, #[case] count: usize) {
        let args = vec![s("x"); count];
        assert!(matches!(call(name, &args), Err(ExprError::Arity { found, .. }) if found == count));
    }

    #[rstest]
    #[case(vec![s("12345"), Sequence::one(2i64)], "2345")]
    #[case(vec![s("12345"), Sequence::one(2i64), Sequence::one(3i64)], "234")]
    #[case(vec![s("12345"), Sequence::one(0i64), Sequence::one(3i64)], "12")]
    fn substring_is_one_based(#[case] args: Vec<Sequence>, #[case] expected: &str) {
        assert_eq!(call("substring", &args).unwrap().string_value(), expected);
    }

    #[rstest]
    fn sum_stays_integral_until_a_double_appears() {
        let ints = Sequence::from(vec![Value::Integer(1), Value::from("2")]);
        assert_eq!(call("sum", &[ints]).unwrap(), Sequence::one(3i64));
        let mixed = Sequence::from(vec![Value::Integer(1), Value::Double(0.5)]);
        assert_eq!(call("sum", &[mixed]).unwrap(), Sequence::one(Value::Double(1.5)));
    }

    #[rstest]
    fn min_and_max_of_empty_are_empty() {
        assert!(call("min", &[Sequence::empty()]).unwrap().is_empty());
        let values = Sequence::from(vec![Value::Integer(3), Value::Integer(-1), Value::Integer(7)]);
        assert_eq!(call("max", &[values.clone()]).unwrap(), Sequence::one(7i64));
        assert_eq!(call("min", &[values]).unwrap(), Sequence::one(-1i64));
    }
}
