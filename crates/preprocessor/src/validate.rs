use confpp_xml::Element;

use crate::error::PreprocessError;

/// Values of the required unqualified attributes, in the order asked for.
pub fn require_attributes<'e, const N: usize>(
    element: &'e Element,
    names: [&str; N],
) -> Result<[&'e str; N], PreprocessError> {
    let mut missing = Vec::new();
    let values = names.map(|name| {
        element.attribute(name).unwrap_or_else(|| {
            missing.push(name.to_string());
            ""
        })
    });
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(PreprocessError::MissingAttribute { element: element.name.qualified(), attributes: missing })
    }
}
