//! Core library for the commission-docs command line application.
//!
//! The library turns one sales dataset into a bundle of per-recipient
//! workbooks and documents. IO adapters for spreadsheets, word-processing
//! packages and zip containers live under [`io`], the value types inside
//! [`model`], the pure pipeline stages in [`table`], [`mapping`],
//! [`populate`], [`tokens`] and [`document`], and the orchestration under
//! [`generate`].

pub mod archive;
pub mod column;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod generate;
pub mod io;
pub mod mapping;
pub mod model;
pub mod populate;
pub mod table;
pub mod tokens;

pub use config::GeneratorConfig;
pub use error::{Result, ToolError};
