use std::io::Write;

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

use crate::error::XmlError;
use crate::node::{Attribute, Declaration, Document, Element, Node, QName, XML_NS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Indentation width; `None` writes the tree exactly as it is.
    pub indent: Option<usize>,
    /// Emit an XML declaration before the document content.
    pub declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { indent: None, declaration: true }
    }
}

impl WriteOptions {
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }
}

pub fn write_document<W: Write>(document: &Document, out: W, options: &WriteOptions) -> Result<(), XmlError> {
    let mut writer = new_writer(out, options);
    if options.declaration {
        let declaration = document.declaration().cloned().unwrap_or_default();
        write_declaration(&mut writer, &declaration)?;
    }
    let mut scope = NamespaceScope::default();
    for node in document.children.iter().filter(|n| !matches!(n, Node::Declaration(_))) {
        write_node(&mut writer, node, &mut scope)?;
    }
    Ok(())
}

pub fn document_to_string(document: &Document, options: &WriteOptions) -> Result<String, XmlError> {
    let mut buffer = Vec::new();
    write_document(document, &mut buffer, options)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Serialises a node sequence without a declaration.
pub fn to_string(nodes: &[Node], options: &WriteOptions) -> Result<String, XmlError> {
    let mut buffer = Vec::new();
    let mut writer = new_writer(&mut buffer, options);
    let mut scope = NamespaceScope::default();
    for node in nodes {
        write_node(&mut writer, node, &mut scope)?;
    }
    drop(writer);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn new_writer<W: Write>(out: W, options: &WriteOptions) -> Writer<W> {
    match options.indent {
        Some(width) => Writer::new_with_indent(out, b' ', width),
        None => Writer::new(out),
    }
}

fn write_declaration<W: Write>(writer: &mut Writer<W>, declaration: &Declaration) -> Result<(), XmlError> {
    let decl = BytesDecl::new(
        &declaration.version,
        declaration.encoding.as_deref(),
        declaration.standalone.as_deref(),
    );
    writer.write_event(Event::Decl(decl))?;
    Ok(())
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node, scope: &mut NamespaceScope) -> Result<(), XmlError> {
    match node {
        Node::Element(element) => write_element(writer, element, scope)?,
        Node::Text(text) => writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?,
        Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
        Node::Comment(text) => writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?,
        Node::ProcessingInstruction { target, data } => {
            let content = if data.is_empty() { target.clone() } else { format!("{target} {data}") };
            writer.write_event(Event::PI(BytesPI::new(content)))?;
        }
        Node::DocType(text) => writer.write_event(Event::DocType(BytesText::from_escaped(text.as_str())))?,
        Node::EntityRef(name) => writer.write_event(Event::Text(BytesText::from_escaped(format!("&{name};"))))?,
        Node::Declaration(declaration) => write_declaration(writer, declaration)?,
    }
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element, scope: &mut NamespaceScope) -> Result<(), XmlError> {
    let tag = element.name.qualified();
    let mut start = BytesStart::new(tag.as_str());

    scope.push();
    for attr in element.attributes.iter().filter(|a| a.is_namespace_declaration()) {
        scope.declare(attr.declared_prefix(), &attr.value);
    }
    let mut repairs: Vec<Attribute> = Vec::new();
    scope.require(&element.name, true, &mut repairs);
    for attr in element.plain_attributes() {
        scope.require(&attr.name, false, &mut repairs);
    }

    for attr in element.attributes.iter().chain(repairs.iter()) {
        let key = attr.name.qualified();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in &element.children {
            write_node(writer, child, scope)?;
        }
        writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    }
    scope.pop();
    Ok(())
}

/// Output-side namespace bindings, used to re-declare prefixes whose original
/// declaration did not survive into the output tree.
#[derive(Default)]
struct NamespaceScope {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceScope {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Adds a declaration to `repairs` when `name` is not bound as it was in the source.
    /// Unprefixed attributes never take the default namespace, so only elements
    /// need the default binding checked.
    fn require(&mut self, name: &QName, is_element: bool, repairs: &mut Vec<Attribute>) {
        let prefix = name.prefix.as_deref();
        if prefix.is_none() && !is_element {
            return;
        }
        let wanted = name.ns_uri.as_deref().unwrap_or("");
        let current = self.lookup(prefix).unwrap_or("");
        if current == wanted {
            return;
        }
        if prefix.is_some() && wanted.is_empty() {
            return;
        }
        let repair = match prefix {
            Some(p) => Attribute::new(QName::new(Some("xmlns".into()), p, Some(crate::node::XMLNS_NS.into())), wanted),
            None => Attribute::new(QName::new(None, "xmlns", Some(crate::node::XMLNS_NS.into())), wanted),
        };
        self.declare(prefix, wanted);
        repairs.push(repair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{elem, elem_ns, text};
    use rstest::rstest;

    fn compact() -> WriteOptions {
        WriteOptions::default().with_declaration(false)
    }

    #[rstest]
    fn escapes_text_and_attributes() {
        let node = elem("a").attr("v", "1 < 2 & \"x\"").text("a<b&c").into_node();
        let out = to_string(&[node], &compact()).unwrap();
        assert_eq!(out, r#"<a v="1 &lt; 2 &amp; &quot;x&quot;">a&lt;b&amp;c</a>"#);
    }

    #[rstest]
    fn redeclares_orphaned_prefix() {
        let node = elem_ns("x", "item", "urn:x").child(elem_ns("x", "sub", "urn:x")).into_node();
        let out = to_string(&[node], &compact()).unwrap();
        assert_eq!(out, r#"<x:item xmlns:x="urn:x"><x:sub/></x:item>"#);
    }

    #[rstest]
    fn undeclares_default_namespace_for_unqualified_child() {
        let inner = elem("plain").into_node();
        let outer = crate::node::ElementBuilder::new(QName::new(None, "root", Some("urn:d".into())))
            .namespace(None, "urn:d")
            .child(inner)
            .into_node();
        let out = to_string(&[outer], &compact()).unwrap();
        assert_eq!(out, r#"<root xmlns="urn:d"><plain xmlns=""/></root>"#);
    }

    #[rstest]
    fn writes_declaration_and_passthrough_nodes() {
        let document = Document::new(
            None,
            vec![
                Node::Comment(" generated ".into()),
                elem("r")
                    .child(Node::ProcessingInstruction { target: "pi".into(), data: "x=1".into() })
                    .child(Node::CData("<raw>".into()))
                    .child(text("t"))
                    .into_node(),
            ],
        );
        let out = document_to_string(&document, &WriteOptions::default()).unwrap();
        assert_eq!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8"?><!-- generated --><r><?pi x=1?><![CDATA[<raw>]]>t</r>"#
        );
    }
}
