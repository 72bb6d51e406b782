use std::sync::Arc;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use url::Url;

use crate::error::XmlError;
use crate::node::{Attribute, Declaration, Document, Element, Node, Position, QName, XMLNS_NS};

/// Parses `text` into a [`Document`].
///
/// Whitespace is preserved verbatim. Predefined entities and character
/// references are folded into the surrounding text; any other entity
/// reference is kept as [`Node::EntityRef`].
pub fn parse_document(text: &str, uri: Option<Url>) -> Result<Document, XmlError> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(false);
    let lines = LineIndex::new(text);
    let source = uri.clone().map(Arc::new);

    let mut open: Vec<Element> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    loop {
        let offset = reader.buffer_position();
        let (resolved, event) = match reader.read_resolved_event() {
            Ok(pair) => pair,
            Err(source) => {
                return Err(XmlError::Syntax { position: reader.error_position(), source });
            }
        };
        let ns_uri = owned_namespace(resolved, offset)?;

        match event {
            Event::Start(start) => {
                let mut element = start_element(&reader, &start, ns_uri, lines.position(offset), offset)?;
                element.document.clone_from(&source);
                open.push(element);
            }
            Event::Empty(start) => {
                let mut element = start_element(&reader, &start, ns_uri, lines.position(offset), offset)?;
                element.document.clone_from(&source);
                append(&mut open, &mut top, Node::from(element));
            }
            Event::End(end) => {
                let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                let Some(element) = open.pop() else {
                    return Err(XmlError::UnexpectedEnd { found, position: offset });
                };
                let expected = element.name.qualified();
                if expected != found {
                    return Err(XmlError::MismatchedEnd { expected, found, position: offset });
                }
                append(&mut open, &mut top, Node::Element(Arc::new(element)));
            }
            Event::Text(content) => {
                append_text(&mut open, &mut top, &String::from_utf8_lossy(&content));
            }
            Event::GeneralRef(reference) => {
                let name = String::from_utf8_lossy(&reference).into_owned();
                if let Some(encoded) = name.strip_prefix('#') {
                    let c = decode_char_ref(encoded).ok_or_else(|| XmlError::InvalidCharRef {
                        reference: name.clone(),
                        position: offset,
                    })?;
                    append_text(&mut open, &mut top, c.encode_utf8(&mut [0u8; 4]));
                } else if let Some(resolved) = resolve_predefined_entity(&name) {
                    append_text(&mut open, &mut top, resolved);
                } else {
                    append(&mut open, &mut top, Node::EntityRef(name));
                }
            }
            Event::CData(content) => {
                append(&mut open, &mut top, Node::CData(String::from_utf8_lossy(&content).into_owned()));
            }
            Event::Comment(content) => {
                append(&mut open, &mut top, Node::Comment(String::from_utf8_lossy(&content).into_owned()));
            }
            Event::PI(content) => {
                let raw = String::from_utf8_lossy(&content).into_owned();
                let (target, data) = match raw.split_once(char::is_whitespace) {
                    Some((target, data)) => (target.to_string(), data.trim_start().to_string()),
                    None => (raw.clone(), String::new()),
                };
                append(&mut open, &mut top, Node::ProcessingInstruction { target, data });
            }
            Event::DocType(content) => {
                let raw = String::from_utf8_lossy(&content).trim().to_string();
                append(&mut open, &mut top, Node::DocType(raw));
            }
            Event::Decl(decl) => {
                let declaration = declaration(&decl).map_err(|source| XmlError::Syntax { position: offset, source })?;
                top.push(Node::Declaration(declaration));
            }
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = open.pop() {
        return Err(XmlError::Unclosed { name: unclosed.name.qualified() });
    }
    let document = Document::new(uri, top);
    if document.root().is_none() {
        return Err(XmlError::NoRoot);
    }
    Ok(document)
}

fn owned_namespace(resolved: ResolveResult<'_>, offset: u64) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix {
            prefix: String::from_utf8_lossy(&prefix).into_owned(),
            position: offset,
        }),
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    ns_uri: Option<String>,
    position: Position,
    offset: u64,
) -> Result<Element, XmlError> {
    let qname = start.name();
    let prefix = qname.prefix().map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let local = String::from_utf8_lossy(qname.local_name().as_ref()).into_owned();
    let mut element = Element::new(QName::new(prefix, local, ns_uri));
    element.position = Some(position);

    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::Syntax { position: offset, source: err.into() })?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|source| XmlError::Syntax { position: offset, source })?
            .into_owned();
        let key = attr.key.as_ref();
        let name = if key == b"xmlns" {
            QName::new(None, "xmlns", Some(XMLNS_NS.to_string()))
        } else if let Some(declared) = key.strip_prefix(b"xmlns:") {
            QName::new(
                Some("xmlns".to_string()),
                String::from_utf8_lossy(declared).into_owned(),
                Some(XMLNS_NS.to_string()),
            )
        } else {
            let (resolved, local) = reader.resolve_attribute(attr.key);
            let ns_uri = owned_namespace(resolved, offset)?;
            let prefix = attr.key.prefix().map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
            QName::new(prefix, String::from_utf8_lossy(local.as_ref()).into_owned(), ns_uri)
        };
        element.attributes.push(Attribute::new(name, value));
    }
    Ok(element)
}

fn declaration(decl: &BytesDecl<'_>) -> Result<Declaration, quick_xml::Error> {
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    let version = text(&decl.version()?);
    let encoding = decl.encoding().transpose()?.map(|e| text(&e));
    let standalone = decl.standalone().transpose()?.map(|s| text(&s));
    Ok(Declaration { version, encoding, standalone })
}

fn decode_char_ref(encoded: &str) -> Option<char> {
    let code = match encoded.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => encoded.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

fn append(open: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn append_text(open: &mut [Element], top: &mut Vec<Node>, value: &str) {
    let siblings = match open.last_mut() {
        Some(parent) => &mut parent.children,
        None => top,
    };
    if let Some(Node::Text(previous)) = siblings.last_mut() {
        previous.push_str(value);
    } else {
        siblings.push(Node::Text(value.to_string()));
    }
}

/// Maps byte offsets to 1-based line/column pairs.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    fn position(&self, offset: u64) -> Position {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Position { line, column }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("ab\ncd\n\nx");
        assert_eq!(index.position(0), Position { line: 1, column: 1 });
        assert_eq!(index.position(4), Position { line: 2, column: 2 });
        assert_eq!(index.position(7), Position { line: 4, column: 1 });
    }

    #[rstest]
    #[case("x41", Some('A'))]
    #[case("65", Some('A'))]
    #[case("xZZ", None)]
    fn char_refs(#[case] encoded: &str, #[case] expected: Option<char>) {
        assert_eq!(decode_char_ref(encoded), expected);
    }
}
