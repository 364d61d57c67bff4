use quick_xml::{
    escape::unescape,
    events::BytesStart,
    name::{Namespace, ResolveResult},
};

/// Some tools prepend a BOM to the container and package documents
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

pub fn is_bound_to(ns: &ResolveResult<'_>, uri: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(bound)) if *bound == uri)
}

/// Returns the unescaped value of the unprefixed attribute `name`
pub fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.as_ref() != name {
            continue;
        }
        let raw = std::str::from_utf8(&attr.value).map_err(|err| err.to_string())?;
        let value = unescape(raw).map_err(|err| err.to_string())?;

        return Ok(Some(value.into_owned()));
    }

    Ok(None)
}

/// Same as `attribute` but a missing attribute is an error
pub fn required_attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<String, String> {
    attribute(element, name)?.ok_or_else(|| {
        format!(
            "<{}> has no {} attribute",
            String::from_utf8_lossy(element.local_name().as_ref()),
            String::from_utf8_lossy(name)
        )
    })
}
