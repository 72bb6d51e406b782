use std::sync::Arc;

use crate::loader::{DocumentLoader, FileLoader};

pub const DEFAULT_NAMESPACE: &str = "urn:confpp:preprocessor";
pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;
pub const DEFAULT_EXPRESSION_CACHE: usize = 256;

/// Treatment of text nodes that contain only whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whitespace {
    /// Drop whitespace-only text.
    #[default]
    Collapse,
    /// Keep every text node.
    Preserve,
}

#[derive(Debug, Clone)]
pub struct Options {
    namespace: String,
    whitespace: Whitespace,
    max_depth: usize,
    max_iterations: usize,
    expression_cache: usize,
    definitions: Vec<(String, String)>,
    loader: Arc<dyn DocumentLoader>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            whitespace: Whitespace::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            expression_cache: DEFAULT_EXPRESSION_CACHE,
            definitions: Vec::new(),
            loader: Arc::new(FileLoader),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn with_whitespace(mut self, whitespace: Whitespace) -> Self {
        self.whitespace = whitespace;
        self
    }

    pub fn whitespace(&self) -> Whitespace {
        self.whitespace
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Capacity of the parsed-expression cache; `0` disables caching.
    pub fn with_expression_cache(mut self, capacity: usize) -> Self {
        self.expression_cache = capacity;
        self
    }

    pub fn expression_cache(&self) -> usize {
        self.expression_cache
    }

    /// Predefines a text symbol in the outermost scope.
    pub fn with_definition(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.definitions.push((name.into(), value.into()));
        self
    }

    pub fn definitions(&self) -> &[(String, String)] {
        &self.definitions
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn loader(&self) -> Arc<dyn DocumentLoader> {
        Arc::clone(&self.loader)
    }
}
