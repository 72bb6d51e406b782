//! XML tree, reader and writer shared by the confpp crates.
pub mod error;
pub mod node;
pub mod reader;
pub mod writer;

pub use error::XmlError;
pub use node::{
    Attribute, Declaration, Document, Element, ElementBuilder, Node, NodeKind, Position, QName, XMLNS_NS, XML_NS,
    comment, elem, elem_ns, is_ncname, is_qname, string_value, text,
};
pub use reader::parse_document;
pub use writer::{WriteOptions, document_to_string, to_string, write_document};
