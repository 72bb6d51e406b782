//! Scoped symbol table, include stack and parsed-expression cache.
//!
//! Frames are pushed and popped only through the scope guard in
//! [`crate::dispatch`]; the outermost frame holds predefined symbols and lives
//! as long as the environment.
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use confpp_expr::{ExprError, Expression};
use confpp_xml::Node;
use lru::LruCache;
use tracing::trace;
use url::Url;

/// A named binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Text(Arc<str>),
    /// Captured, unevaluated nodes; expanded in the scope active at use.
    Nodes(Arc<[Node]>),
}

pub struct Environment {
    frames: Vec<HashMap<String, Symbol>>,
    includes: Vec<Url>,
    expressions: Option<LruCache<String, Expression>>,
}

impl Environment {
    pub fn new(expression_cache: usize) -> Self {
        Self {
            frames: vec![HashMap::new()],
            includes: Vec::new(),
            expressions: NonZeroUsize::new(expression_cache).map(LruCache::new),
        }
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub(crate) fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn define_text(&mut self, name: impl Into<String>, value: impl Into<Arc<str>>) {
        self.define(name.into(), Symbol::Text(value.into()));
    }

    pub fn define_nodes(&mut self, name: impl Into<String>, nodes: impl Into<Arc<[Node]>>) {
        self.define(name.into(), Symbol::Nodes(nodes.into()));
    }

    fn define(&mut self, name: String, symbol: Symbol) {
        trace!(%name, frame = self.frames.len(), "define symbol");
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, symbol);
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub(crate) fn push_include(&mut self, uri: Url) {
        self.includes.push(uri);
    }

    pub(crate) fn pop_include(&mut self) {
        self.includes.pop();
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.includes.contains(uri)
    }

    /// URI of the innermost open document, used as the base for relative hrefs.
    pub fn current_document(&self) -> Option<&Url> {
        self.includes.last()
    }

    /// Parses `source`, reusing a cached parse when available.
    pub fn expression(&mut self, source: &str) -> Result<Expression, ExprError> {
        if let Some(cache) = self.expressions.as_mut() {
            if let Some(expr) = cache.get(source) {
                return Ok(expr.clone());
            }
            let expr = Expression::parse(source)?;
            cache.put(source.to_string(), expr.clone());
            return Ok(expr);
        }
        Expression::parse(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn env() -> Environment {
        Environment::new(4)
    }

    #[rstest]
    fn inner_frames_shadow_and_restore(mut env: Environment) {
        env.define_text("x", "outer");
        env.push_frame();
        env.define_text("x", "inner");
        env.define_text("y", "only-inner");
        assert_eq!(env.lookup("x"), Some(&Symbol::Text("inner".into())));
        env.pop_frame();
        assert_eq!(env.lookup("x"), Some(&Symbol::Text("outer".into())));
        assert!(!env.is_defined("y"));
    }

    #[rstest]
    fn outermost_frame_is_never_popped(mut env: Environment) {
        env.define_text("keep", "1");
        env.pop_frame();
        assert!(env.is_defined("keep"));
        assert_eq!(env.depth(), 1);
    }

    #[rstest]
    fn include_stack_tracks_current_document(mut env: Environment) {
        let a = Url::parse("file:///conf/a.xml").unwrap();
        let b = Url::parse("file:///conf/sub/b.xml").unwrap();
        env.push_include(a.clone());
        env.push_include(b.clone());
        assert_eq!(env.current_document(), Some(&b));
        assert!(env.is_open(&a));
        env.pop_include();
        assert_eq!(env.current_document(), Some(&a));
        assert!(!env.is_open(&b));
    }

    #[rstest]
    fn expressions_are_cached_by_source(mut env: Environment) {
        let first = env.expression("1 + 2").unwrap();
        let second = env.expression("1 + 2").unwrap();
        assert_eq!(first.source(), second.source());
        assert!(env.expression("1 +").is_err());
    }

    #[rstest]
    fn cache_can_be_disabled() {
        let mut env = Environment::new(0);
        assert!(env.expression("true()").is_ok());
    }
}
