//! Macro-expanding preprocessor for XML build configuration.
//!
//! Elements in the preprocessor namespace are directives (conditionals,
//! loops, symbol definitions, includes); everything else is copied with
//! `{name}` references expanded. The result is a directive-free document.
//!
//! ```
//! use confpp::Preprocessor;
//!
//! let source = r#"<targets xmlns:pp="urn:confpp:preprocessor">
//!   <pp:count name="i" max="2"><target id="t{i}"/></pp:count>
//! </targets>"#;
//! let output = Preprocessor::default().process_str(source, None).unwrap();
//! let xml = confpp_xml::to_string(&output.children, &Default::default()).unwrap();
//! assert_eq!(xml, r#"<targets><target id="t1"/><target id="t2"/></targets>"#);
//! ```
pub mod directives;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod interpolate;
pub mod loader;
pub mod options;
pub mod validate;

use std::path::Path;

use confpp_xml::{Document, XmlError, parse_document};
use tracing::debug;
use url::Url;

pub use dispatch::{Context, Expander};
pub use environment::{Environment, Symbol};
pub use error::PreprocessError;
pub use loader::{DocumentLoader, FileLoader, LoadError, MemoryLoader};
pub use options::{DEFAULT_NAMESPACE, Options, Whitespace};

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    options: Options,
}

impl Preprocessor {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Expands every directive in `document`.
    pub fn process_document(&self, document: &Document) -> Result<Document, PreprocessError> {
        debug!(uri = ?document.uri.as_ref().map(Url::as_str), "preprocessing document");
        let mut expander = Expander::new(&self.options, document.uri.as_ref());
        let children = expander.expand_document(document, self.options.whitespace())?;
        Ok(Document::new(document.uri.clone(), children))
    }

    /// Parses and expands `text`; relative includes resolve against `base`.
    pub fn process_str(&self, text: &str, base: Option<Url>) -> Result<Document, PreprocessError> {
        let document = parse_document(text, base)?;
        self.process_document(&document)
    }

    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<Document, PreprocessError> {
        let path = std::path::absolute(path.as_ref()).map_err(XmlError::from)?;
        let text = std::fs::read_to_string(&path).map_err(XmlError::from)?;
        self.process_str(&text, Url::from_file_path(&path).ok())
    }
}
