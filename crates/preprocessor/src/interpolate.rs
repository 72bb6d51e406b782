//! Tokenizer for inline `{name}` symbol references.
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(Cow<'a, str>),
    Symbol(&'a str),
}

/// Splits `text` into literal runs and symbol references.
///
/// `{{` and `}}` stand for literal braces; a brace pair whose content is not a
/// symbol name is kept verbatim.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    if !text.contains(['{', '}']) {
        return vec![Segment::Literal(Cow::Borrowed(text))];
    }

    let mut out = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    while let Some(idx) = rest.find(['{', '}']) {
        literal.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            literal.push_str(&tail[..1]);
            rest = &tail[2..];
        } else if let Some(name) = tail.strip_prefix('{').and_then(reference_name) {
            if !literal.is_empty() {
                out.push(Segment::Literal(Cow::Owned(std::mem::take(&mut literal))));
            }
            out.push(Segment::Symbol(name));
            rest = &tail[name.len() + 2..];
        } else {
            literal.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        out.push(Segment::Literal(Cow::Owned(literal)));
    }
    out
}

/// The name at the start of `text` if it is immediately followed by `}`.
fn reference_name(text: &str) -> Option<&str> {
    let end = text.find('}')?;
    let name = &text[..end];
    is_symbol_name(name).then_some(name)
}

pub fn is_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
