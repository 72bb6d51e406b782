use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("unknown namespace prefix '{prefix}' at byte {position}")]
    UnknownPrefix { prefix: String, position: u64 },
    #[error("end tag </{found}> does not match <{expected}> at byte {position}")]
    MismatchedEnd { expected: String, found: String, position: u64 },
    #[error("unexpected end tag </{found}> at byte {position}")]
    UnexpectedEnd { found: String, position: u64 },
    #[error("unclosed element <{name}> at end of input")]
    Unclosed { name: String },
    #[error("invalid character reference '&{reference};' at byte {position}")]
    InvalidCharRef { reference: String, position: u64 },
    #[error("document has no root element")]
    NoRoot,
    #[error("failed to write XML: {0}")]
    Io(#[from] std::io::Error),
}
