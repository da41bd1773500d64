//! Small helpers shared by the XML part rewriters.

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, ToolError};

/// Returns the unescaped value of the attribute whose qualified name is `name`.
pub fn attribute_value(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == name {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Returns the value of the first prefixed attribute with the given local
/// name, e.g. `r:id` regardless of the prefix bound to the relationships
/// namespace.
pub fn prefixed_attribute_value(element: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.prefix().is_some() && attribute.key.local_name().as_ref() == local {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Copies an element start tag, dropping the attribute named `skip`.
pub fn copy_without(element: &BytesStart<'_>, skip: &[u8]) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut copy = BytesStart::new(name);
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() != skip {
            copy.push_attribute(attribute);
        }
    }
    Ok(copy)
}

/// Appends the decoded content of a text event.
pub fn push_text(target: &mut String, text: &BytesText<'_>) -> Result<()> {
    target.push_str(&text.xml_content()?);
    Ok(())
}

/// Appends the character an entity or character reference stands for.
pub fn push_reference(target: &mut String, reference: &BytesRef<'_>) -> Result<()> {
    let raw = reference.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(|_| ToolError::InvalidPackage(format!("invalid character reference '&{raw};'")))?;
        if let Some(character) = char::from_u32(code) {
            target.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        target.push_str(entity);
    } else {
        return Err(ToolError::InvalidPackage(format!("unknown entity '&{raw};'")));
    }
    Ok(())
}

/// Copies `xml`, dropping every element with local name `local` for which
/// `matches` returns `true`, including its content.
pub fn remove_elements(
    xml: &[u8],
    local: &[u8],
    matches: impl Fn(&BytesStart<'_>) -> Result<bool>,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    loop {
        match reader.read_event()? {
            Event::Empty(element)
                if element.local_name().as_ref() == local && matches(&element)? => {}
            Event::Start(element)
                if element.local_name().as_ref() == local && matches(&element)? =>
            {
                reader.read_to_end(element.name())?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_elements_are_removed_with_their_content() {
        let xml = r#"<Types><Default Extension="xml"/><Override PartName="/xl/calcChain.xml"><x/></Override><Override PartName="/xl/workbook.xml"/></Types>"#;
        let filtered = remove_elements(xml.as_bytes(), b"Override", |element| {
            Ok(attribute_value(element, b"PartName")?.as_deref() == Some("/xl/calcChain.xml"))
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(filtered).unwrap(),
            r#"<Types><Default Extension="xml"/><Override PartName="/xl/workbook.xml"/></Types>"#
        );
    }
}
