use confpp_xml::{Node, NodeKind, Position, WriteOptions, XmlError, document_to_string, parse_document, to_string};
use rstest::rstest;

const PP: &str = "urn:confpp:preprocessor";

#[rstest]
fn resolves_element_and_attribute_namespaces() {
    let doc = parse_document(
        r#"<root xmlns:pp="urn:confpp:preprocessor" xmlns:x="urn:x"><pp:if expr="1"/><x:a x:id="1" plain="2"/></root>"#,
        None,
    )
    .unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.name.ns_uri, None);

    let directive = root.children[0].as_element().unwrap();
    assert!(directive.name.matches(PP, "if"));
    assert_eq!(directive.attribute("expr"), Some("1"));

    let a = root.children[1].as_element().unwrap();
    assert_eq!(a.name.ns_uri.as_deref(), Some("urn:x"));
    let prefixed = a.attributes.iter().find(|attr| attr.name.local == "id").unwrap();
    assert_eq!(prefixed.name.ns_uri.as_deref(), Some("urn:x"));
    assert_eq!(a.attribute("plain"), Some("2"));
}

#[rstest]
fn default_namespace_applies_to_elements_only() {
    let doc = parse_document(r#"<root xmlns="urn:d" a="1"><c/></root>"#, None).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.name.ns_uri.as_deref(), Some("urn:d"));
    assert_eq!(root.children[0].as_element().unwrap().name.ns_uri.as_deref(), Some("urn:d"));
    let a = root.plain_attributes().next().unwrap();
    assert_eq!(a.name.ns_uri, None);
}

#[rstest]
fn records_start_tag_positions() {
    let doc = parse_document("<root>\n  <child/>\n</root>", None).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.position, Some(Position { line: 1, column: 1 }));
    let child = root.child_elements().next().unwrap();
    assert_eq!(child.position, Some(Position { line: 2, column: 3 }));
}

#[rstest]
fn elements_remember_their_document() {
    let uri = url::Url::parse("file:///conf/main.xml").unwrap();
    let doc = parse_document("<root><child/></root>", Some(uri.clone())).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.document.as_deref(), Some(&uri));
    assert_eq!(root.child_elements().next().unwrap().document.as_deref(), Some(&uri));
    assert_eq!(parse_document("<r/>", None).unwrap().root().unwrap().document, None);
}

#[rstest]
fn folds_predefined_and_character_references_into_text() {
    let doc = parse_document("<r>a &lt; b &amp;&#65;&#x42;</r>", None).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].as_text(), Some("a < b &AB"));
}

#[rstest]
fn keeps_whitespace_and_passthrough_kinds() {
    let doc = parse_document("<?xml version=\"1.0\"?>\n<!-- c --><r> <![CDATA[x]]><?t d?></r>", None).unwrap();
    let kinds: Vec<NodeKind> = doc.children.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::Declaration, NodeKind::Text, NodeKind::Comment, NodeKind::Element]);
    let root = doc.root().unwrap();
    let kinds: Vec<NodeKind> = root.children.iter().map(Node::kind).collect();
    assert_eq!(kinds, vec![NodeKind::Text, NodeKind::CData, NodeKind::ProcessingInstruction]);
}

#[rstest]
#[case("<a><b></a>")]
#[case("<a>")]
#[case("<p:a/>")]
#[case("<!-- only a comment -->")]
fn rejects_malformed_input(#[case] input: &str) {
    assert!(parse_document(input, None).is_err(), "{input} should not parse");
}

#[rstest]
fn unknown_prefix_is_reported() {
    let err = parse_document("<p:a/>", None).unwrap_err();
    assert!(matches!(err, XmlError::UnknownPrefix { ref prefix, .. } if prefix == "p"), "{err}");
}

#[rstest]
fn parsed_children_keep_their_namespace_when_detached() {
    let doc = parse_document(r#"<wrap xmlns:x="urn:x"><x:a/></wrap>"#, None).unwrap();
    let inner = doc.root().unwrap().children.clone();
    let out = to_string(&inner, &WriteOptions::default().with_declaration(false)).unwrap();
    assert_eq!(out, r#"<x:a xmlns:x="urn:x"/>"#);
}

#[rstest]
fn document_output_reuses_source_declaration() {
    let doc = parse_document("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>", None).unwrap();
    let out = document_to_string(&doc, &WriteOptions::default()).unwrap();
    assert_eq!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>");
}
