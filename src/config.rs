use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::format::CurrencyFormat;

/// Number of candidate rows scanned when looking for the dataset header.
pub const DEFAULT_HEADER_SCAN_DEPTH: usize = 50;
/// Archive name used when the caller does not provide one.
pub const DEFAULT_ARCHIVE_NAME: &str = "Commission_Workbooks.zip";

/// Names and conventions shared by the dataset, the templates, and the
/// generated files. Every field has a default so partial JSON files work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Sheet of the dataset holding one row per sales record.
    pub source_sheet: String,
    /// Column whose presence identifies the header row.
    pub recipient_column: String,
    pub territory_column: String,
    pub workbook_template_column: String,
    pub document_template_column: String,
    /// How many rows are considered when locating the header.
    pub header_scan_depth: usize,
    /// Sheet of each workbook template holding the mapping table.
    pub mapping_sheet: String,
    /// Zero-based column holding source-column labels in the mapping sheet.
    pub mapping_source_column: usize,
    /// Zero-based column holding destination tags in the mapping sheet.
    pub mapping_tag_column: usize,
    /// Label of the column populated in the mapping sheet.
    pub destination_column: String,
    /// Tag prefixes that also feed document substitution.
    pub document_tag_prefixes: Vec<String>,
    /// Tag for the recipient name placeholder.
    pub name_tag: String,
    /// Tag for the territory placeholder.
    pub territory_tag: String,
    /// Substring of document template names replaced by `_{recipient}.docx`.
    pub document_name_marker: String,
    /// Suffix appended to the recipient for workbook artifacts.
    pub workbook_suffix: String,
    pub currency: CurrencyFormat,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source_sheet: "Target Summary".to_string(),
            recipient_column: "Sales Person".to_string(),
            territory_column: "Territory".to_string(),
            workbook_template_column: "Workbook Template".to_string(),
            document_template_column: "Doc Template".to_string(),
            header_scan_depth: DEFAULT_HEADER_SCAN_DEPTH,
            mapping_sheet: "Component Input".to_string(),
            mapping_source_column: 5,
            mapping_tag_column: 6,
            destination_column: "D".to_string(),
            document_tag_prefixes: vec!["Q".to_string(), "A".to_string()],
            name_tag: "NAME".to_string(),
            territory_tag: "TERR".to_string(),
            document_name_marker: "Master.docx".to_string(),
            workbook_suffix: "_Sales_Report.xlsx".to_string(),
            currency: CurrencyFormat::default(),
        }
    }
}

impl GeneratorConfig {
    /// Loads a configuration from a JSON file, filling omitted fields with
    /// their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Columns that must all be present in the dataset header row.
    pub fn required_columns(&self) -> [&str; 4] {
        [
            self.recipient_column.as_str(),
            self.territory_column.as_str(),
            self.workbook_template_column.as_str(),
            self.document_template_column.as_str(),
        ]
    }

    /// File name of the workbook generated for `recipient`.
    pub fn workbook_artifact_name(&self, recipient: &str) -> String {
        format!("{recipient}{}", self.workbook_suffix)
    }

    /// File name of the document generated for `recipient` from `template`.
    pub fn document_artifact_name(&self, template: &str, recipient: &str) -> String {
        template.replace(&self.document_name_marker, &format!("_{recipient}.docx"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GeneratorConfig = serde_json::from_str(
            r#"{ "header_scan_depth": 10, "currency": { "symbol": "£" } }"#,
        )
        .unwrap();
        assert_eq!(config.header_scan_depth, 10);
        assert_eq!(config.currency.symbol, "£");
        assert_eq!(config.currency.thousands_separator, ",");
        assert_eq!(config.source_sheet, "Target Summary");
    }

    #[test]
    fn artifact_names_follow_conventions() {
        let config = GeneratorConfig::default();
        assert_eq!(
            config.workbook_artifact_name("Jane Doe"),
            "Jane Doe_Sales_Report.xlsx"
        );
        assert_eq!(
            config.document_artifact_name("Master.docx", "Jane Doe"),
            "_Jane Doe.docx"
        );
        assert_eq!(
            config.document_artifact_name("Plan Master.docx", "Jane Doe"),
            "Plan _Jane Doe.docx"
        );
        assert_eq!(
            config.document_artifact_name("Plan.docx", "Jane Doe"),
            "Plan.docx"
        );
    }
}
