//! Resolution of mapping entries against a recipient's authoritative row.

use crate::column::column_index;
use crate::error::{Result, ToolError};
use crate::model::{CellValue, MappingEntry, SourceRow};

/// A mapping entry paired with the source value it selects.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry<'a> {
    pub entry: &'a MappingEntry,
    pub value: &'a CellValue,
}

/// Outcome of resolving a whole mapping table for one row.
#[derive(Debug, Default)]
pub struct Resolution<'a> {
    pub entries: Vec<ResolvedEntry<'a>>,
    /// Entries whose label is not a column label.
    pub invalid: Vec<(&'a MappingEntry, ToolError)>,
}

/// Looks up the value selected by `entry`.
///
/// Returns `Ok(None)` for inert entries (empty label) and for labels beyond
/// the row's columns.
pub fn resolve_entry<'a>(
    entry: &MappingEntry,
    row: &'a SourceRow,
) -> Result<Option<&'a CellValue>> {
    if entry.source_label.trim().is_empty() {
        return Ok(None);
    }
    let index = column_index(&entry.source_label)?;
    Ok(row.columns.get(index))
}

/// Resolves every entry, keeping table order.
pub fn resolve_entries<'a>(entries: &'a [MappingEntry], row: &'a SourceRow) -> Resolution<'a> {
    let mut resolution = Resolution::default();
    for entry in entries {
        match resolve_entry(entry, row) {
            Ok(Some(value)) => resolution.entries.push(ResolvedEntry { entry, value }),
            Ok(None) => {}
            Err(error) => resolution.invalid.push((entry, error)),
        }
    }
    resolution
}
