use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook, open_workbook_from_rs};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{Result, ToolError};
use crate::model::{CellValue, MappingEntry};
use crate::table::{Grid, SourceTable};

/// Reads the dataset workbook and resolves its header row.
pub fn read_source_table(path: &Path, config: &GeneratorConfig) -> Result<SourceTable> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let grid = read_sheet_grid(&mut workbook, &config.source_sheet)?
        .ok_or_else(|| ToolError::MissingSheet(config.source_sheet.clone()))?;
    debug!(
        height = grid.height(),
        width = grid.width(),
        "loaded dataset sheet"
    );
    SourceTable::from_grid(&grid, config)
}

/// Opens an in-memory copy of a workbook template.
pub fn open_template(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>> {
    Ok(open_workbook_from_rs(Cursor::new(bytes))?)
}

/// Reads the mapping table from the template's mapping sheet.
///
/// The first sheet row is the table's own header; every later row becomes
/// one entry, in order, with blank cells read as empty strings.
pub fn read_mapping<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    template: &str,
    config: &GeneratorConfig,
) -> Result<Vec<MappingEntry>> {
    let grid = read_sheet_grid(workbook, &config.mapping_sheet)?.ok_or_else(|| {
        ToolError::MissingMappingSheet {
            template: template.to_string(),
            sheet: config.mapping_sheet.clone(),
        }
    })?;

    let entries = (1..grid.height())
        .map(|row| MappingEntry {
            row: row - 1,
            source_label: grid
                .cell(row, config.mapping_source_column)
                .display_text()
                .trim()
                .to_string(),
            tag: grid
                .cell(row, config.mapping_tag_column)
                .display_text()
                .trim()
                .to_string(),
        })
        .collect();
    Ok(entries)
}

/// Loads a sheet into an absolutely addressed grid, or `None` when the
/// workbook has no sheet of that name.
pub fn read_sheet_grid<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    name: &str,
) -> Result<Option<Grid>> {
    let range = match workbook.worksheet_range(name) {
        Some(range) => range?,
        None => return Ok(None),
    };
    Ok(Some(range_to_grid(name, &range)))
}

fn range_to_grid(name: &str, range: &Range<DataType>) -> Grid {
    let (row_offset, column_offset) = match range.start() {
        Some((row, column)) => (row as usize, column as usize),
        None => return Grid::new(name, Vec::new()),
    };

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    for source_row in range.rows() {
        let mut cells = vec![CellValue::Empty; column_offset];
        cells.extend(source_row.iter().map(to_cell_value));
        rows.push(cells);
    }
    Grid::new(name, rows)
}

fn to_cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Empty,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(value) => CellValue::DateTime(*value),
        other => CellValue::Text(other.to_string()),
    }
}
