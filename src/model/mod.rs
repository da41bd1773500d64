use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Typed value of a single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Blank or absent cell.
    #[default]
    Empty,
    /// Text literal.
    Text(String),
    /// Numeric literal.
    Number(f64),
    /// Boolean literal.
    Bool(bool),
    /// Date or time stored as an Excel serial number (1900 date system).
    DateTime(f64),
}

impl CellValue {
    /// Returns `true` when the cell carries no value.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.is_empty(),
            _ => false,
        }
    }

    /// Plain text rendering used for file names, territories and
    /// non-numeric substitutions.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(value) => value.clone(),
            CellValue::Number(value) => format_plain_number(*value),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::DateTime(serial) => match serial_to_datetime(*serial) {
                Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
                None => format_plain_number(*serial),
            },
        }
    }
}

fn format_plain_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() {
        return None;
    }
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}

/// One record of the sales dataset after header resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// Recipient the row belongs to.
    pub recipient: String,
    /// Territory label substituted for `<<TERR>>`.
    pub territory: CellValue,
    /// File name of the workbook template.
    pub workbook_template: String,
    /// File name of the document template.
    pub document_template: String,
    /// Every column of the row, column A first.
    pub columns: Vec<CellValue>,
}

/// Declarative rule binding one source column to a destination cell and,
/// for question/answer tags, to a document placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Position of the entry in the mapping table (0 is the first row below
    /// the mapping sheet's header).
    pub row: usize,
    /// Column label in the source dataset, possibly empty.
    pub source_label: String,
    /// Destination tag, possibly empty.
    pub tag: String,
}

impl MappingEntry {
    /// Returns `true` when the tag is a document field for the given prefixes.
    pub fn is_document_field(&self, prefixes: &[String]) -> bool {
        !self.tag.is_empty() && prefixes.iter().any(|prefix| self.tag.starts_with(prefix.as_str()))
    }
}

/// Placeholder → display value mapping for one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMap {
    entries: BTreeMap<String, String>,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a tag in the placeholder delimiters, e.g. `Q1` → `<<Q1>>`.
    pub fn placeholder(tag: &str) -> String {
        format!("<<{tag}>>")
    }

    /// Inserts the value for `tag`, replacing any earlier value.
    pub fn insert_tag(&mut self, tag: &str, value: impl Into<String>) {
        self.entries.insert(Self::placeholder(tag), value.into());
    }

    /// Inserts a raw placeholder key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// A generated file prior to archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Ordered artifacts produced by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBundle {
    artifacts: Vec<Artifact>,
}

impl OutputBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an artifact and returns the name it was stored under.
    ///
    /// A name already present in the bundle receives a ` (n)` suffix before
    /// its extension so that no artifact is overwritten in the archive.
    pub fn push(&mut self, mut artifact: Artifact) -> String {
        if self.contains(&artifact.name) {
            let (stem, extension) = split_extension(&artifact.name);
            let mut counter = 2;
            loop {
                let candidate = format!("{stem} ({counter}){extension}");
                if !self.contains(&candidate) {
                    artifact.name = candidate;
                    break;
                }
                counter += 1;
            }
        }
        let name = artifact.name.clone();
        self.artifacts.push(artifact);
        name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.iter().any(|artifact| artifact.name == name)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn names(&self) -> Vec<&str> {
        self.artifacts
            .iter()
            .map(|artifact| artifact.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}
