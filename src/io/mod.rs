pub mod docx;
pub mod excel_read;
pub mod package;
pub mod xlsx_patch;
pub mod xml;
