use confpp_xml::{Attribute, Element, Node, QName, XML_NS, is_ncname, is_qname, string_value};

use crate::dispatch::{Context, Expander, append};
use crate::error::PreprocessError;
use crate::options::Whitespace;
use crate::validate::require_attributes;

/// `scope`: children expanded in a new frame holding the element's attributes.
pub fn scope_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let mut bindings = Vec::new();
    for attr in element.plain_attributes() {
        bindings.push((attr.name.local.as_str(), ex.interpolate_string(&attr.value)?));
    }
    ex.call(|ex| {
        for (name, value) in bindings {
            ex.env.define_text(name, value);
        }
        ex.expand_children(element, ctx.whitespace)
    })
}

/// `include`: the target document's content, expanded in the current scope.
pub fn include_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [href] = require_attributes(element, ["href"])?;
    let href = ex.interpolate_string(href)?;
    ex.with_include(href.trim(), |ex, document| {
        let content: Vec<Node> = document
            .children
            .iter()
            .filter(|node| !matches!(node, Node::Declaration(_) | Node::DocType(_)))
            .cloned()
            .collect();
        ex.expand_nodes(&content, ctx.whitespace)
    })
}

pub fn config_template_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    ex.expand_children(element, ctx.whitespace)
}

/// `element`: an element whose name is computed; `attribute` children become its attributes.
///
/// Names must be well-formed XML names and an attribute may be given only once.
pub fn element_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    ctx: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name] = require_attributes(element, ["name"])?;
    let name = ex.interpolate_string(name)?;
    let namespace = match element.attribute("namespace") {
        Some(uri) => Some(ex.interpolate_string(uri)?),
        None => None,
    };
    let name = synthesized_name(name.trim(), namespace)?;

    let mut attributes: Vec<Attribute> = Vec::new();
    let mut children = Vec::new();
    let nodes = element.children();
    for (idx, node) in nodes.iter().enumerate() {
        match node.as_element() {
            Some(child) if ex.is_directive(child, "attribute") => {
                let attribute = synthesized_attribute(ex, child)?;
                if attributes.iter().any(|a| a.name == attribute.name) {
                    return Err(invalid_name(&attribute.name.qualified(), "attribute is specified more than once"));
                }
                attributes.push(attribute);
            }
            _ => {
                let expanded = ex.descend(|ex| ex.expand_node(node, &nodes[idx + 1..], ctx.whitespace))?;
                append(&mut children, expanded);
            }
        }
    }
    Ok(vec![Node::from(Element {
        name,
        attributes,
        children,
        position: element.position,
        document: element.document.clone(),
    })])
}

fn invalid_name(name: &str, reason: &str) -> PreprocessError {
    PreprocessError::InvalidExpression { expr: name.to_string(), reason: reason.to_string() }
}

fn synthesized_name(name: &str, namespace: Option<String>) -> Result<QName, PreprocessError> {
    if !is_qname(name) {
        return Err(invalid_name(name, "not a valid XML element name"));
    }
    match name.split_once(':') {
        Some(("xmlns", _)) => Err(invalid_name(name, "the xmlns prefix is reserved")),
        Some((_, _)) if namespace.as_deref().is_none_or(str::is_empty) => {
            Err(invalid_name(name, "a prefixed element name needs a namespace"))
        }
        Some((prefix, local)) => Ok(QName::new(Some(prefix.to_string()), local, namespace)),
        None => Ok(QName::new(None, name, namespace)),
    }
}

/// Attribute names are unprefixed apart from the predeclared `xml` prefix.
fn synthesized_attribute(ex: &mut Expander<'_>, directive: &Element) -> Result<Attribute, PreprocessError> {
    let [name] = require_attributes(directive, ["name"])?;
    let name = ex.interpolate_string(name)?;
    let name = name.trim();
    let qname = match name.split_once(':') {
        Some(("xml", local)) if is_ncname(local) => QName::new(Some("xml".to_string()), local, Some(XML_NS.to_string())),
        None if is_ncname(name) && name != "xmlns" => QName::local(name),
        _ => return Err(invalid_name(name, "not a valid attribute name")),
    };
    let value = ex.expand_children(directive, Whitespace::Preserve)?;
    Ok(Attribute::new(qname, string_value(&value)))
}

/// `attribute` is consumed by its `element` parent and is an error anywhere else.
pub fn attribute_directive(
    _: &mut Expander<'_>,
    element: &Element,
    _: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    Err(PreprocessError::MisplacedDirective(element.name.qualified()))
}

pub fn processing_instruction_directive(
    ex: &mut Expander<'_>,
    element: &Element,
    _: &Context<'_>,
) -> Result<Vec<Node>, PreprocessError> {
    let [name] = require_attributes(element, ["name"])?;
    let target = ex.interpolate_string(name)?.trim().to_string();
    if !is_ncname(&target) || target.eq_ignore_ascii_case("xml") {
        return Err(invalid_name(&target, "not a valid processing-instruction target"));
    }
    let data = string_value(&ex.expand_children(element, Whitespace::Preserve)?);
    if data.contains("?>") {
        return Err(PreprocessError::InvalidExpression {
            expr: data,
            reason: "processing-instruction data must not contain '?>'".to_string(),
        });
    }
    Ok(vec![Node::ProcessingInstruction { target, data }])
}

pub fn ignore_directive(_: &mut Expander<'_>, _: &Element, _: &Context<'_>) -> Result<Vec<Node>, PreprocessError> {
    Ok(Vec::new())
}
