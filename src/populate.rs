//! Population of the workbook template with a recipient's values.

use tracing::debug;

use crate::column::column_index;
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::io::xlsx_patch::{self, CellWrite};
use crate::mapping::ResolvedEntry;

/// Plans one write per resolved entry: mapping row `r` lands on sheet row
/// `r + 1` (zero-based), directly beside the entry below the header row.
pub fn plan_writes(resolved: &[ResolvedEntry<'_>], destination_column: usize) -> Vec<CellWrite> {
    resolved
        .iter()
        .map(|resolved| CellWrite {
            row: resolved.entry.row as u32 + 1,
            column: destination_column,
            value: resolved.value.clone(),
        })
        .collect()
}

/// Returns a populated copy of `template`; the template bytes are not modified.
pub fn populate_workbook(
    template: &[u8],
    resolved: &[ResolvedEntry<'_>],
    config: &GeneratorConfig,
) -> Result<Vec<u8>> {
    let destination_column = column_index(&config.destination_column)?;
    let writes = plan_writes(resolved, destination_column);
    debug!(
        write_count = writes.len(),
        sheet = %config.mapping_sheet,
        "populating workbook"
    );
    xlsx_patch::write_cells(template, &config.mapping_sheet, &writes)
}
