//! Resolution of `include` targets into parsed documents.
use std::collections::HashMap;
use std::fmt;
use std::io;

use confpp_xml::{Document, XmlError, parse_document};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("unsupported URI scheme in '{0}'")]
    UnsupportedScheme(String),
    #[error("invalid document reference '{href}'")]
    InvalidUri {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to read '{uri}'")]
    Io {
        uri: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{uri}'")]
    Parse {
        uri: String,
        #[source]
        source: XmlError,
    },
}

pub trait DocumentLoader: Send + Sync + fmt::Debug {
    fn load(&self, uri: &Url) -> Result<Document, LoadError>;
}

/// Loads `file:` URIs from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn load(&self, uri: &Url) -> Result<Document, LoadError> {
        if uri.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme(uri.to_string()));
        }
        let path = uri.to_file_path().map_err(|()| LoadError::NotFound(uri.to_string()))?;
        let text = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(uri.to_string()),
            _ => LoadError::Io { uri: uri.to_string(), source },
        })?;
        parse(&text, uri)
    }
}

/// In-memory documents keyed by absolute URI.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(uri, text);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(uri.into(), text.into());
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, uri: &Url) -> Result<Document, LoadError> {
        let text = self.documents.get(uri.as_str()).ok_or_else(|| LoadError::NotFound(uri.to_string()))?;
        parse(text, uri)
    }
}

fn parse(text: &str, uri: &Url) -> Result<Document, LoadError> {
    parse_document(text, Some(uri.clone())).map_err(|source| LoadError::Parse { uri: uri.to_string(), source })
}
