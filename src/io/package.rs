//! In-memory view of an Office Open XML package (a zip of XML parts).

use std::io::{Cursor, Read, Write};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, ToolError};
use crate::io::xml::{attribute_value, remove_elements};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[derive(Debug, Clone)]
struct Part {
    name: String,
    bytes: Vec<u8>,
    is_dir: bool,
}

/// Relationship declared by a part's `.rels` companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Relationship type URI.
    pub kind: String,
    /// Package part the relationship points at, without a leading slash.
    pub target: String,
}

impl Relationship {
    /// Returns `true` when the type URI ends with `/{suffix}`.
    pub fn is_kind(&self, suffix: &str) -> bool {
        self.kind
            .rsplit('/')
            .next()
            .is_some_and(|last| last == suffix)
    }
}

/// Ordered parts of a package. Parts that are never replaced are written back
/// byte for byte.
#[derive(Debug, Clone)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            parts.push(Part {
                name: entry.name().to_string(),
                bytes: content,
                is_dir: entry.is_dir(),
            });
        }
        Ok(Self { parts })
    }

    /// Looks a part up by name, ignoring case and path separator style.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.position(name)
            .map(|index| self.parts[index].bytes.as_slice())
    }

    /// Returns a part that must exist.
    pub fn required_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| ToolError::InvalidPackage(format!("missing part '{name}'")))
    }

    pub fn replace_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ToolError::InvalidPackage(format!("missing part '{name}'")))?;
        self.parts[index].bytes = bytes;
        Ok(())
    }

    /// Removes a part together with its relationship from `source` and its
    /// content type override. Returns `false` when no such part exists.
    pub fn remove_part(&mut self, source: &str, relationship: &Relationship) -> Result<bool> {
        let Some(index) = self.position(&relationship.target) else {
            return Ok(false);
        };
        self.parts.remove(index);

        let (_, rels_name) = rels_part_name(source);
        if let Some(rels) = self.part(&rels_name) {
            let rels = remove_elements(rels, b"Relationship", |element| {
                Ok(attribute_value(element, b"Id")?.as_deref() == Some(relationship.id.as_str()))
            })?;
            self.replace_part(&rels_name, rels)?;
        }

        let part_name = format!("/{}", relationship.target);
        if let Some(types) = self.part(CONTENT_TYPES_PART) {
            let types = remove_elements(types, b"Override", |element| {
                Ok(attribute_value(element, b"PartName")?
                    .is_some_and(|name| name.eq_ignore_ascii_case(&part_name)))
            })?;
            self.replace_part(CONTENT_TYPES_PART, types)?;
        }
        Ok(true)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|part| part.name.as_str())
    }

    /// Reads the relationships declared for `source`, resolving internal
    /// targets into part names. A part without relationships yields none.
    pub fn relationships(&self, source: &str) -> Result<Vec<Relationship>> {
        let (directory, rels_name) = rels_part_name(source);
        let Some(bytes) = self.part(&rels_name) else {
            return Ok(Vec::new());
        };

        let mut relationships = Vec::new();
        let mut reader = Reader::from_reader(bytes);
        loop {
            match reader.read_event()? {
                Event::Start(element) | Event::Empty(element)
                    if element.local_name().as_ref() == b"Relationship" =>
                {
                    if attribute_value(&element, b"TargetMode")?.as_deref() == Some("External") {
                        continue;
                    }
                    let id = attribute_value(&element, b"Id")?;
                    let kind = attribute_value(&element, b"Type")?;
                    let target = attribute_value(&element, b"Target")?;
                    if let (Some(id), Some(kind), Some(target)) = (id, kind, target) {
                        relationships.push(Relationship {
                            id,
                            kind,
                            target: resolve_target(directory, &target),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(relationships)
    }

    /// Serialises the package into a new deflate-compressed zip.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for part in &self.parts {
            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
                continue;
            }
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.bytes)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let pattern = name.replace('\\', "/");
        let pattern = pattern.trim_start_matches('/');
        self.parts
            .iter()
            .position(|part| part.name.eq_ignore_ascii_case(pattern))
    }
}

/// Splits `source` into its directory and the name of its `.rels` part.
fn rels_part_name(source: &str) -> (&str, String) {
    let (directory, file) = match source.rfind('/') {
        Some(index) => (&source[..index], &source[index + 1..]),
        None => ("", source),
    };
    let rels_name = if directory.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{directory}/_rels/{file}.rels")
    };
    (directory, rels_name)
}

/// Resolves a relationship target against the directory of its source part.
fn resolve_target(directory: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    match target.strip_prefix('/') {
        Some(absolute) => normalize(absolute.split('/')),
        None => normalize(directory.split('/').chain(target.split('/'))),
    }
}

fn normalize<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_with(parts: &[(&str, &str)]) -> Package {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        Package::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn targets_resolve_relative_to_the_source_part() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("word", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn relationships_skip_external_targets() {
        let package = package_with(&[
            ("word/document.xml", "<w:document/>"),
            (
                "word/_rels/document.xml.rels",
                r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#,
            ),
        ]);

        let relationships = package.relationships("word/document.xml").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].target, "word/header1.xml");
        assert!(relationships[0].is_kind("header"));
        assert!(package.relationships("word/header1.xml").unwrap().is_empty());
    }

    #[test]
    fn untouched_parts_survive_a_rewrite() {
        let mut package = package_with(&[("a.xml", "<a/>"), ("b.xml", "<b/>")]);
        package.replace_part("B.xml", b"<b>changed</b>".to_vec()).unwrap();

        let reread = Package::from_bytes(&package.to_bytes().unwrap()).unwrap();
        assert_eq!(reread.part("a.xml"), Some(b"<a/>".as_slice()));
        assert_eq!(reread.part("b.xml"), Some(b"<b>changed</b>".as_slice()));
        assert_eq!(reread.part_names().collect::<Vec<_>>(), vec!["a.xml", "b.xml"]);
        assert!(package.replace_part("missing.xml", Vec::new()).is_err());
    }
}
