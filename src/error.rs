use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// generator reads its inputs, patches templates, or writes the archive.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the JSON configuration cannot be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors raised while reading or writing zip containers.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Errors raised while parsing package XML parts.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Raised when an XML attribute is malformed.
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Raised when XML text is not valid in its declared encoding.
    #[error("XML encoding error: {0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    /// Raised when a column label is empty or contains non-letters.
    #[error("invalid column label '{0}'")]
    InvalidLabel(String),

    /// Raised when no candidate row holds the marker column.
    #[error("no row within the first {depth} rows of '{sheet}' contains a '{marker}' column")]
    HeaderNotFound {
        sheet: String,
        marker: String,
        depth: usize,
    },

    /// Raised when the header row lacks one or more required columns.
    #[error("header row of '{sheet}' is missing required columns: {}", missing.join(", "))]
    MissingColumns { sheet: String, missing: Vec<String> },

    /// Raised when the dataset does not contain the expected sheet.
    #[error("workbook does not contain a '{0}' sheet")]
    MissingSheet(String),

    /// Raised when a workbook template lacks its mapping sheet.
    #[error("workbook template '{template}' must contain a '{sheet}' sheet")]
    MissingMappingSheet { template: String, sheet: String },

    /// Raised when an office package does not follow the expected layout.
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
