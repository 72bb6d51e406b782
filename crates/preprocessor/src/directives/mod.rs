//! Directive processors, keyed by local name within the preprocessor namespace.
use std::collections::HashMap;
use std::sync::LazyLock;

use confpp_xml::{Element, Node};

use crate::dispatch::{Context, Expander};
use crate::error::PreprocessError;

pub mod conditional;
pub mod loops;
pub mod structural;
pub mod symbols;

pub type Processor = fn(&mut Expander<'_>, &Element, &Context<'_>) -> Result<Vec<Node>, PreprocessError>;

static REGISTRY: LazyLock<HashMap<&'static str, Processor>> = LazyLock::new(|| {
    let mut registry: HashMap<&'static str, Processor> = HashMap::new();
    registry.insert("if", conditional::if_directive);
    registry.insert("ifdef", conditional::ifdef_directive);
    registry.insert("ifndef", conditional::ifndef_directive);
    registry.insert("else", conditional::else_directive);
    registry.insert("count", loops::count_directive);
    registry.insert("for", loops::for_directive);
    registry.insert("for-each", loops::for_each_directive);
    registry.insert("define", symbols::define_directive);
    registry.insert("eval", symbols::eval_directive);
    registry.insert("scope", structural::scope_directive);
    registry.insert("include", structural::include_directive);
    registry.insert("config-template", structural::config_template_directive);
    registry.insert("element", structural::element_directive);
    registry.insert("attribute", structural::attribute_directive);
    registry.insert("processing-instruction", structural::processing_instruction_directive);
    registry.insert("ignore", structural::ignore_directive);
    registry
});

/// Processor registered for `local`; `None` means a symbol invocation.
pub fn lookup(local: &str) -> Option<Processor> {
    REGISTRY.get(local).copied()
}
