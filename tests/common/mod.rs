//! Builders for the workbooks and documents used by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const HEADER: [&str; 5] = [
    "Sales Person",
    "Territory",
    "Sales",
    "Workbook Template",
    "Doc Template",
];

/// One dataset row following [`HEADER`].
pub struct Record<'a> {
    pub recipient: &'a str,
    pub territory: &'a str,
    pub sales: f64,
    pub workbook_template: &'a str,
    pub document_template: &'a str,
}

impl<'a> Record<'a> {
    pub fn new(recipient: &'a str, territory: &'a str, sales: f64) -> Self {
        Self {
            recipient,
            territory,
            sales,
            workbook_template: "WB1.xlsx",
            document_template: "Master.docx",
        }
    }
}

/// Temporary directory tree laid out like a real run's inputs.
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("temporary directory");
        fs::create_dir(root.path().join("workbooks")).expect("workbook directory");
        fs::create_dir(root.path().join("documents")).expect("document directory");
        Self { root }
    }

    pub fn sales_data(&self) -> PathBuf {
        self.root.path().join("sales.xlsx")
    }

    pub fn workbook_templates(&self) -> PathBuf {
        self.root.path().join("workbooks")
    }

    pub fn document_templates(&self) -> PathBuf {
        self.root.path().join("documents")
    }
}

/// Writes the dataset with a title row and a blank row above the header.
pub fn write_sales_data(path: &Path, sheet: &str, records: &[Record<'_>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).expect("sheet name");
    worksheet
        .write_string(0, 0, "Quarterly commission targets")
        .expect("title");
    for (column, label) in HEADER.iter().enumerate() {
        worksheet
            .write_string(2, column as u16, *label)
            .expect("header cell");
    }
    for (offset, record) in records.iter().enumerate() {
        let row = 3 + offset as u32;
        worksheet.write_string(row, 0, record.recipient).expect("recipient");
        worksheet.write_string(row, 1, record.territory).expect("territory");
        worksheet.write_number(row, 2, record.sales).expect("sales");
        worksheet
            .write_string(row, 3, record.workbook_template)
            .expect("workbook template");
        worksheet
            .write_string(row, 4, record.document_template)
            .expect("document template");
    }
    workbook.save(path).expect("dataset saved");
}

/// Writes a workbook template whose mapping sheet holds the given
/// `(source label, tag)` rows below a header row.
pub fn write_workbook_template(path: &Path, mapping_sheet: &str, mapping: &[(&str, &str)]) {
    let mut workbook = Workbook::new();
    let summary = workbook.add_worksheet();
    summary.set_name("Summary").expect("sheet name");
    summary.write_string(0, 0, "Commission summary").expect("title");

    let input = workbook.add_worksheet();
    input.set_name(mapping_sheet).expect("sheet name");
    input.write_string(0, 0, "Component").expect("header");
    input.write_string(0, 3, "Value").expect("header");
    input.write_string(0, 5, "Source").expect("header");
    input.write_string(0, 6, "Tag").expect("header");
    for (offset, (label, tag)) in mapping.iter().enumerate() {
        let row = 1 + offset as u32;
        input.write_string(row, 0, format!("Component {row}")).expect("component");
        input.write_string(row, 5, *label).expect("source label");
        input.write_string(row, 6, *tag).expect("tag");
    }
    workbook.save(path).expect("template saved");
}

const WORD_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const RELATIONSHIP_TYPES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Builds a minimal word-processing package with one paragraph per entry of
/// `paragraphs`, each paragraph split into the given runs.
pub fn docx_bytes(paragraphs: &[&[&str]]) -> Vec<u8> {
    package_bytes(paragraphs, None)
}

/// Like [`docx_bytes`], with a header part and a footer part holding one
/// paragraph each.
pub fn docx_with_sections(paragraphs: &[&[&str]], header: &str, footer: &str) -> Vec<u8> {
    package_bytes(paragraphs, Some((header, footer)))
}

fn paragraphs_xml(paragraphs: &[&[&str]]) -> String {
    let mut body = String::new();
    for runs in paragraphs {
        body.push_str("<w:p>");
        for run in *runs {
            body.push_str(&format!(
                r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
                escape(run)
            ));
        }
        body.push_str("</w:p>");
    }
    body
}

fn package_bytes(paragraphs: &[&[&str]], sections: Option<(&str, &str)>) -> Vec<u8> {
    let declaration = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
    let body = paragraphs_xml(paragraphs);
    let document = format!(
        r#"{declaration}<w:document xmlns:w="{WORD_NAMESPACE}"><w:body>{body}</w:body></w:document>"#
    );

    let mut overrides = String::from(
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    );
    let mut parts = vec![
        (
            "_rels/.rels".to_string(),
            format!(
                r#"{declaration}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RELATIONSHIP_TYPES}/officeDocument" Target="word/document.xml"/></Relationships>"#
            ),
        ),
        ("word/document.xml".to_string(), document),
    ];

    if let Some((header, footer)) = sections {
        let header: &[&str] = &[header];
        let footer: &[&str] = &[footer];
        overrides.push_str(
            r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#,
        );
        overrides.push_str(
            r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#,
        );
        parts.push((
            "word/_rels/document.xml.rels".to_string(),
            format!(
                r#"{declaration}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RELATIONSHIP_TYPES}/header" Target="header1.xml"/><Relationship Id="rId2" Type="{RELATIONSHIP_TYPES}/footer" Target="footer1.xml"/></Relationships>"#
            ),
        ));
        parts.push((
            "word/header1.xml".to_string(),
            format!(
                r#"{declaration}<w:hdr xmlns:w="{WORD_NAMESPACE}">{}</w:hdr>"#,
                paragraphs_xml(&[header])
            ),
        ));
        parts.push((
            "word/footer1.xml".to_string(),
            format!(
                r#"{declaration}<w:ftr xmlns:w="{WORD_NAMESPACE}">{}</w:ftr>"#,
                paragraphs_xml(&[footer])
            ),
        ));
    }

    parts.insert(
        0,
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"{declaration}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
            ),
        ),
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in parts {
        writer.start_file(name, options).expect("entry started");
        writer.write_all(content.as_bytes()).expect("entry written");
    }
    writer.finish().expect("package finished").into_inner()
}

pub fn write_docx(path: &Path, paragraphs: &[&[&str]]) {
    fs::write(path, docx_bytes(paragraphs)).expect("document saved");
}

pub fn write_docx_with_sections(path: &Path, paragraphs: &[&[&str]], header: &str, footer: &str) {
    fs::write(path, docx_with_sections(paragraphs, header, footer)).expect("document saved");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
