//! In-memory XML tree used as input and output of the preprocessor.
//!
//! The model is deliberately small:
//! - Elements are reference counted, so node sequences captured by symbols
//!   share structure with the document they came from
//! - Attributes are not nodes; namespace declarations stay in the attribute list
//! - Sibling navigation is done by slicing a parent's `children`
//!
//! Example:
//! ```
//! use confpp_xml::node::{elem, text};
//!
//! // <server name="alpha">up</server>
//! let server = elem("server").attr("name", "alpha").child(text("up")).build();
//! assert_eq!(server.attribute("name"), Some("alpha"));
//! assert_eq!(server.string_value(), "up");
//! ```
use std::fmt;
use std::sync::Arc;

use url::Url;

pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    pub fn new(prefix: Option<String>, local: impl Into<String>, ns_uri: Option<String>) -> Self {
        Self { prefix, local: local.into(), ns_uri }
    }

    /// Lexical form as written in markup (`prefix:local` or `local`).
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    pub fn matches(&self, ns_uri: &str, local: &str) -> bool {
        self.ns_uri.as_deref() == Some(ns_uri) && self.local == local
    }

    pub fn in_namespace(&self, ns_uri: &str) -> bool {
        self.ns_uri.as_deref() == Some(ns_uri)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self { name, value: value.into() }
    }

    /// `xmlns` or `xmlns:p` declaration.
    pub fn is_namespace_declaration(&self) -> bool {
        self.name.in_namespace(XMLNS_NS)
    }

    /// Prefix declared by a namespace declaration; `None` for the default namespace.
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name.prefix.is_some() { Some(self.name.local.as_str()) } else { None }
    }
}

/// 1-based source position of an element start tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub position: Option<Position>,
    /// Document the element was parsed from; `position` refers to this document.
    pub document: Option<Arc<Url>>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self { name, attributes: Vec::new(), children: Vec::new(), position: None, document: None }
    }

    /// Value of an unqualified attribute.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.prefix.is_none() && a.name.local == local && !a.is_namespace_declaration())
            .map(|a| a.value.as_str())
    }

    /// Attributes that are not namespace declarations.
    pub fn plain_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.is_namespace_declaration())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Arc<Element>> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text content of all descendants.
    pub fn string_value(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(&e.children, out),
            _ => {}
        }
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// XML `NCName`: a name without colons.
pub fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// `prefix:local` or `local`, both parts being `NCName`s.
pub fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self { version: "1.0".to_string(), encoding: Some("UTF-8".to_string()), standalone: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
    DocType,
    EntityRef,
    Declaration,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Element => "element",
            NodeKind::Text => "text",
            NodeKind::CData => "cdata",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
            NodeKind::DocType => "doctype",
            NodeKind::EntityRef => "entity-reference",
            NodeKind::Declaration => "xml-declaration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Arc<Element>),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
    DocType(String),
    /// General entity reference that is neither predefined nor a character reference.
    EntityRef(String),
    /// Only legal as the first node of a document prolog.
    Declaration(Declaration),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Element(_) => NodeKind::Element,
            Node::Text(_) => NodeKind::Text,
            Node::CData(_) => NodeKind::CData,
            Node::Comment(_) => NodeKind::Comment,
            Node::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            Node::DocType(_) => NodeKind::DocType,
            Node::EntityRef(_) => NodeKind::EntityRef,
            Node::Declaration(_) => NodeKind::Declaration,
        }
    }

    pub fn as_element(&self) -> Option<&Arc<Element>> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Text nodes that contain nothing but whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    pub fn string_value(&self) -> String {
        match self {
            Node::Element(e) => e.string_value(),
            Node::Text(t) | Node::CData(t) | Node::Comment(t) => t.clone(),
            Node::ProcessingInstruction { data, .. } => data.clone(),
            Node::EntityRef(name) => format!("&{name};"),
            Node::DocType(_) | Node::Declaration(_) => String::new(),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(Arc::new(element))
    }
}

/// Concatenated string value of a node sequence.
pub fn string_value(nodes: &[Node]) -> String {
    nodes.iter().map(Node::string_value).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub uri: Option<Url>,
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(uri: Option<Url>, children: Vec<Node>) -> Self {
        Self { uri, children }
    }

    pub fn root(&self) -> Option<&Arc<Element>> {
        self.children.iter().find_map(Node::as_element)
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        self.children.iter().find_map(|n| match n {
            Node::Declaration(d) => Some(d),
            _ => None,
        })
    }
}

pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new(name: QName) -> Self {
        Self { element: Element::new(name) }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.element.attributes.push(Attribute::new(QName::local(name), value));
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.element.attributes.push(attribute);
        self
    }

    /// Declares `prefix` (or the default namespace when `None`) on this element.
    pub fn namespace(mut self, prefix: Option<&str>, uri: &str) -> Self {
        let name = match prefix {
            Some(p) => QName::new(Some("xmlns".to_string()), p, Some(XMLNS_NS.to_string())),
            None => QName::new(None, "xmlns", Some(XMLNS_NS.to_string())),
        };
        self.element.attributes.push(Attribute::new(name, uri));
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.element.children.push(child.into());
        self
    }

    pub fn children<I: IntoIterator<Item = Node>>(mut self, children: I) -> Self {
        self.element.children.extend(children);
        self
    }

    pub fn text(self, value: &str) -> Self {
        self.child(Node::Text(value.to_string()))
    }

    pub fn position(mut self, line: usize, column: usize) -> Self {
        self.element.position = Some(Position { line, column });
        self
    }

    pub fn build(self) -> Element {
        self.element
    }

    pub fn into_node(self) -> Node {
        Node::from(self.element)
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        builder.into_node()
    }
}

pub fn elem(name: &str) -> ElementBuilder {
    ElementBuilder::new(QName::local(name))
}

pub fn elem_ns(prefix: &str, local: &str, uri: &str) -> ElementBuilder {
    ElementBuilder::new(QName::new(Some(prefix.to_string()), local, Some(uri.to_string())))
}

pub fn text(value: &str) -> Node {
    Node::Text(value.to_string())
}

pub fn comment(value: &str) -> Node {
    Node::Comment(value.to_string())
}
