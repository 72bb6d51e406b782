//! Recursive expansion of nodes.
//!
//! Every expansion result is an owned `Vec<Node>`, so a sequence produced
//! inside a scope is always fully realised before that scope's guard drops.
use std::ops::{Deref, DerefMut};

use confpp_expr::{Sequence, Value, Variables};
use confpp_xml::{Attribute, Document, Element, Node};
use tracing::{debug, trace};
use url::Url;

use crate::directives;
use crate::environment::{Environment, Symbol};
use crate::error::PreprocessError;
use crate::interpolate::{Segment, segments};
use crate::loader::LoadError;
use crate::options::{Options, Whitespace};

/// Per-call state handed to directive processors.
#[derive(Debug, Clone, Copy)]
pub struct Context<'n> {
    pub whitespace: Whitespace,
    /// Siblings after the node being expanded.
    pub following: &'n [Node],
}

pub struct Expander<'o> {
    pub(crate) options: &'o Options,
    pub(crate) env: Environment,
    depth: usize,
}

/// Restores expander state when dropped, on success, error and unwind alike.
pub(crate) struct Guard<'a, 'o> {
    expander: &'a mut Expander<'o>,
    release: fn(&mut Expander<'o>),
}

impl<'o> Deref for Guard<'_, 'o> {
    type Target = Expander<'o>;

    fn deref(&self) -> &Self::Target {
        self.expander
    }
}

impl DerefMut for Guard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.expander
    }
}

impl Drop for Guard<'_, '_> {
    fn drop(&mut self) {
        (self.release)(self.expander);
    }
}

impl<'o> Expander<'o> {
    pub fn new(options: &'o Options, document: Option<&Url>) -> Self {
        let mut env = Environment::new(options.expression_cache());
        for (name, value) in options.definitions() {
            env.define_text(name.as_str(), value.as_str());
        }
        if let Some(uri) = document {
            env.push_include(uri.clone());
        }
        Self { options, env, depth: 0 }
    }

    pub fn namespace(&self) -> &'o str {
        self.options.namespace()
    }

    pub(crate) fn is_directive(&self, element: &Element, local: &str) -> bool {
        element.name.matches(self.namespace(), local)
    }

    /// Runs `body` in a fresh innermost frame.
    pub fn call<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, PreprocessError>,
    ) -> Result<T, PreprocessError> {
        self.env.push_frame();
        let mut guard = Guard { expander: self, release: |ex| ex.env.pop_frame() };
        body(&mut *guard)
    }

    /// Runs `body` one nesting level deeper, failing past the configured limit.
    pub(crate) fn descend<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, PreprocessError>,
    ) -> Result<T, PreprocessError> {
        let limit = self.options.max_depth();
        if self.depth >= limit {
            return Err(PreprocessError::RecursionLimit(limit));
        }
        self.depth += 1;
        let mut guard = Guard { expander: self, release: |ex| ex.depth -= 1 };
        body(&mut *guard)
    }

    /// Top-level children of a document; the prolog declaration and doctype pass through.
    pub fn expand_document(&mut self, document: &Document, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        let mut out = Vec::new();
        for (idx, node) in document.children.iter().enumerate() {
            match node {
                Node::Declaration(_) | Node::DocType(_) => out.push(node.clone()),
                _ => {
                    let expanded = self.expand_node(node, &document.children[idx + 1..], whitespace)?;
                    append(&mut out, expanded);
                }
            }
        }
        Ok(out)
    }

    pub fn expand_nodes(&mut self, nodes: &[Node], whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        let mut out = Vec::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            let expanded = self.expand_node(node, &nodes[idx + 1..], whitespace)?;
            append(&mut out, expanded);
        }
        Ok(out)
    }

    pub fn expand_children(&mut self, element: &Element, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        self.expand_nodes(element.children(), whitespace)
    }

    pub fn expand_node(
        &mut self,
        node: &Node,
        following: &[Node],
        whitespace: Whitespace,
    ) -> Result<Vec<Node>, PreprocessError> {
        match node {
            Node::Element(element) => {
                let ctx = Context { whitespace, following };
                self.expand_element(element, &ctx).map_err(|error| self.locate(element, error))
            }
            Node::Text(text) => {
                if whitespace == Whitespace::Collapse && text.trim().is_empty() {
                    Ok(Vec::new())
                } else {
                    self.interpolate(text, whitespace)
                }
            }
            Node::CData(_)
            | Node::Comment(_)
            | Node::ProcessingInstruction { .. }
            | Node::DocType(_)
            | Node::EntityRef(_) => Ok(vec![node.clone()]),
            Node::Declaration(_) => Err(PreprocessError::UnhandledNodeKind(node.kind())),
        }
    }

    fn expand_element(&mut self, element: &Element, ctx: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
        if !element.name.in_namespace(self.namespace()) {
            return self.copy_element(element, ctx.whitespace);
        }
        trace!(directive = %element.name.local, "dispatch");
        match directives::lookup(&element.name.local) {
            Some(process) => process(self, element, ctx),
            None => directives::symbols::invoke(self, element, ctx),
        }
    }

    /// Copies a non-directive element, interpolating attribute values and expanding children.
    fn copy_element(&mut self, element: &Element, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        let namespace = self.namespace();
        let mut attributes = Vec::with_capacity(element.attributes.len());
        for attr in &element.attributes {
            if attr.is_namespace_declaration() {
                if attr.value != namespace {
                    attributes.push(attr.clone());
                }
                continue;
            }
            attributes.push(Attribute::new(attr.name.clone(), self.interpolate_string(&attr.value)?));
        }
        let children = self.descend(|ex| ex.expand_children(element, whitespace))?;
        let copy = Element {
            name: element.name.clone(),
            attributes,
            children,
            position: element.position,
            document: element.document.clone(),
        };
        Ok(vec![Node::from(copy)])
    }

    fn locate(&self, element: &Element, error: PreprocessError) -> PreprocessError {
        if matches!(error, PreprocessError::At { .. }) {
            return error;
        }
        // A template element reports the document it was written in, not the one invoking it.
        let document = element
            .document
            .as_deref()
            .or_else(|| self.env.current_document())
            .map_or_else(|| "<input>".to_string(), Url::to_string);
        let location = match element.position {
            Some(position) => format!("{document}:{position}"),
            None => document,
        };
        PreprocessError::At { element: element.name.qualified(), location, source: Box::new(error) }
    }

    /// Expands `{name}` references in a text run into nodes.
    pub fn interpolate(&mut self, text: &str, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        let mut out = Vec::new();
        for segment in segments(text) {
            match segment {
                Segment::Literal(literal) => append(&mut out, vec![Node::Text(literal.into_owned())]),
                Segment::Symbol(name) => {
                    let nodes = self.eval_symbol(name, whitespace)?;
                    append(&mut out, nodes);
                }
            }
        }
        Ok(out)
    }

    /// String value of `text` after interpolation, with whitespace preserved.
    pub fn interpolate_string(&mut self, text: &str) -> Result<String, PreprocessError> {
        if !text.contains(['{', '}']) {
            return Ok(text.to_string());
        }
        let nodes = self.interpolate(text, Whitespace::Preserve)?;
        Ok(confpp_xml::string_value(&nodes))
    }

    /// Expands the symbol bound to `name` in the current scope.
    pub fn eval_symbol(&mut self, name: &str, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        match self.env.lookup(name).cloned() {
            None => Err(PreprocessError::UndefinedSymbol(name.to_string())),
            Some(Symbol::Text(text)) if text.is_empty() => Ok(Vec::new()),
            Some(Symbol::Text(text)) => Ok(vec![Node::Text(text.to_string())]),
            Some(Symbol::Nodes(nodes)) => self.descend(|ex| ex.expand_nodes(&nodes, whitespace)),
        }
    }

    /// Evaluates an expression with every referenced symbol bound as a variable.
    pub fn eval_expr(&mut self, source: &str, whitespace: Whitespace) -> Result<Sequence, PreprocessError> {
        let expr = self.env.expression(source).map_err(|e| PreprocessError::expression(source, e))?;
        let mut variables = Variables::new();
        for name in expr.variables() {
            let value = match self.env.lookup(name).cloned() {
                None => continue,
                Some(Symbol::Text(text)) => Sequence::one(&*text),
                Some(Symbol::Nodes(_)) => self.eval_symbol(name, whitespace)?.into_iter().map(Value::Node).collect(),
            };
            variables.insert(name, value);
        }
        expr.evaluate(&variables).map_err(|e| PreprocessError::expression(source, e))
    }

    /// Expression result as nodes: node values as they are, atomic values as text.
    pub fn eval_expr_nodes(&mut self, source: &str, whitespace: Whitespace) -> Result<Vec<Node>, PreprocessError> {
        let sequence = self.eval_expr(source, whitespace)?;
        Ok(sequence
            .into_iter()
            .map(|value| match value {
                Value::Node(node) => node,
                atomic => Node::Text(atomic.string_value()),
            })
            .collect())
    }

    pub fn eval_expr_string(&mut self, source: &str, whitespace: Whitespace) -> Result<String, PreprocessError> {
        Ok(self.eval_expr(source, whitespace)?.string_value())
    }

    pub fn eval_bool(&mut self, source: &str, whitespace: Whitespace) -> Result<bool, PreprocessError> {
        self.eval_expr(source, whitespace)?.effective_boolean().map_err(|e| PreprocessError::expression(source, e))
    }

    /// Integer result of an expression, written in base 10.
    pub fn eval_integer(&mut self, source: &str, whitespace: Whitespace) -> Result<i64, PreprocessError> {
        let text = self.eval_expr_string(source, whitespace)?;
        text.trim().parse::<i64>().map_err(|_| PreprocessError::InvalidExpression {
            expr: source.to_string(),
            reason: format!("'{text}' is not an integer"),
        })
    }

    /// Resolves `href` against the current document and runs `body` with the loaded document open.
    pub fn with_include<T>(
        &mut self,
        href: &str,
        body: impl FnOnce(&mut Self, &Document) -> Result<T, PreprocessError>,
    ) -> Result<T, PreprocessError> {
        let uri = self.resolve(href)?;
        if self.env.is_open(&uri) {
            return Err(PreprocessError::IncludeCycle(uri.to_string()));
        }
        debug!(%href, %uri, "including document");
        let document = self.options.loader().load(&uri).map_err(|source| match source {
            LoadError::Parse { source, .. } => PreprocessError::Parse(source),
            source => PreprocessError::IncludeNotFound { href: href.to_string(), source },
        })?;
        self.descend(|ex| {
            ex.env.push_include(uri);
            let mut guard = Guard { expander: ex, release: |ex| ex.env.pop_include() };
            body(&mut *guard, &document)
        })
    }

    fn resolve(&self, href: &str) -> Result<Url, PreprocessError> {
        let resolved = match self.env.current_document() {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        resolved.map_err(|source| PreprocessError::IncludeNotFound {
            href: href.to_string(),
            source: LoadError::InvalidUri { href: href.to_string(), source },
        })
    }
}

/// Appends `nodes`, merging a leading text node into a trailing one.
pub(crate) fn append(out: &mut Vec<Node>, nodes: Vec<Node>) {
    for node in nodes {
        match (out.last_mut(), node) {
            (Some(Node::Text(previous)), Node::Text(text)) => previous.push_str(&text),
            (_, node) => out.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confpp_xml::{Declaration, NodeKind, elem, text};
    use rstest::rstest;

    #[rstest]
    fn append_merges_adjacent_text() {
        let mut out = vec![text("a")];
        append(&mut out, vec![text("b"), elem("x").into_node(), text("c"), text("d")]);
        assert_eq!(out, vec![text("ab"), elem("x").into_node(), text("cd")]);
    }

    #[rstest]
    fn xml_declaration_inside_content_is_rejected() {
        let options = Options::new();
        let mut ex = Expander::new(&options, None);
        let node = Node::Declaration(Declaration::default());
        assert!(matches!(
            ex.expand_node(&node, &[], Whitespace::Collapse),
            Err(PreprocessError::UnhandledNodeKind(NodeKind::Declaration))
        ));
    }

    #[rstest]
    fn scope_guard_pops_on_error() {
        let options = Options::new();
        let mut ex = Expander::new(&options, None);
        let result: Result<(), _> = ex.call(|ex| {
            ex.env.define_text("leak", "1");
            Err(PreprocessError::UndefinedSymbol("boom".into()))
        });
        assert!(result.is_err());
        assert!(!ex.env.is_defined("leak"));
        assert_eq!(ex.env.depth(), 1);
    }

    #[rstest]
    fn descend_enforces_depth_limit() {
        let options = Options::new().with_max_depth(2);
        let mut ex = Expander::new(&options, None);
        let result = ex.descend(|ex| ex.descend(|ex| ex.descend(|_| Ok(()))));
        assert!(matches!(result, Err(PreprocessError::RecursionLimit(2))));
        assert!(ex.descend(|_| Ok(())).is_ok());
    }

    #[rstest]
    fn text_symbols_interpolate_inline() {
        let options = Options::new().with_definition("name", "world");
        let mut ex = Expander::new(&options, None);
        assert_eq!(ex.interpolate("hello {name}!", Whitespace::Collapse).unwrap(), vec![text("hello world!")]);
        assert_eq!(ex.interpolate_string("{{name}}").unwrap(), "{name}");
        assert!(matches!(ex.interpolate_string("{nope}"), Err(PreprocessError::UndefinedSymbol(n)) if n == "nope"));
    }

    #[rstest]
    fn expression_variables_come_from_scope() {
        let options = Options::new().with_definition("i", "3");
        let mut ex = Expander::new(&options, None);
        assert!(ex.eval_bool("i < 4", Whitespace::Collapse).unwrap());
        assert_eq!(ex.eval_integer("$i + 1", Whitespace::Collapse).unwrap(), 4);
        assert!(matches!(
            ex.eval_integer("'x'", Whitespace::Collapse),
            Err(PreprocessError::InvalidExpression { .. })
        ));
        assert!(matches!(ex.eval_bool("j = 1", Whitespace::Collapse), Err(PreprocessError::UndefinedSymbol(n)) if n == "j"));
    }
}
