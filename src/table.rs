//! Header detection and recipient grouping over a loosely structured sheet.

use std::collections::HashMap;

use crate::config::GeneratorConfig;
use crate::error::{Result, ToolError};
use crate::model::{CellValue, SourceRow};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Rectangular snapshot of a sheet addressed by absolute zero-based
/// coordinates, so row 0 is the first sheet row and column 0 is column A.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    name: String,
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl Grid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            name: name.into(),
            rows,
            width,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Returns the row padded to the full grid width.
    pub fn padded_row(&self, row: usize) -> Vec<CellValue> {
        (0..self.width)
            .map(|column| self.cell(row, column).clone())
            .collect()
    }
}

/// Returns the index of the first row below `depth` that contains `marker`.
pub fn locate_header(grid: &Grid, marker: &str, depth: usize) -> Result<usize> {
    (0..depth.min(grid.height()))
        .find(|&row| {
            (0..grid.width()).any(|column| grid.cell(row, column).display_text().trim() == marker)
        })
        .ok_or_else(|| ToolError::HeaderNotFound {
            sheet: grid.name().to_string(),
            marker: marker.to_string(),
            depth,
        })
}

/// Dataset rows interpreted through the located header.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

/// Rows sharing one recipient, in sheet order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientGroup<'a> {
    pub recipient: &'a str,
    pub rows: Vec<&'a SourceRow>,
}

impl<'a> RecipientGroup<'a> {
    /// The row whose template references and scalar values are used.
    pub fn authoritative(&self) -> &'a SourceRow {
        self.rows[0]
    }
}

impl SourceTable {
    /// Locates the header and extracts every row that names a recipient.
    pub fn from_grid(grid: &Grid, config: &GeneratorConfig) -> Result<Self> {
        let header_row = locate_header(grid, &config.recipient_column, config.header_scan_depth)?;
        let headers: Vec<String> = (0..grid.width())
            .map(|column| grid.cell(header_row, column).display_text().trim().to_string())
            .collect();

        let position = |name: &str| headers.iter().position(|header| header == name);
        let missing: Vec<String> = config
            .required_columns()
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingColumns {
                sheet: grid.name().to_string(),
                missing,
            });
        }

        // Checked above.
        let recipient_col = position(&config.recipient_column).unwrap_or_default();
        let territory_col = position(&config.territory_column).unwrap_or_default();
        let workbook_col = position(&config.workbook_template_column).unwrap_or_default();
        let document_col = position(&config.document_template_column).unwrap_or_default();

        let mut rows = Vec::new();
        for row in header_row + 1..grid.height() {
            let recipient = grid.cell(row, recipient_col).display_text();
            if recipient.trim().is_empty() {
                continue;
            }
            rows.push(SourceRow {
                recipient,
                territory: grid.cell(row, territory_col).clone(),
                workbook_template: grid.cell(row, workbook_col).display_text().trim().to_string(),
                document_template: grid.cell(row, document_col).display_text().trim().to_string(),
                columns: grid.padded_row(row),
            });
        }

        Ok(Self {
            header_row,
            headers,
            rows,
        })
    }

    /// Groups rows by recipient in order of first appearance.
    pub fn group_by_recipient(&self) -> Vec<RecipientGroup<'_>> {
        let mut groups: Vec<RecipientGroup<'_>> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for row in &self.rows {
            match positions.get(row.recipient.as_str()) {
                Some(&index) => groups[index].rows.push(row),
                None => {
                    positions.insert(row.recipient.as_str(), groups.len());
                    groups.push(RecipientGroup {
                        recipient: row.recipient.as_str(),
                        rows: vec![row],
                    });
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn grid_with_header_at(row: usize) -> Grid {
        let mut rows = vec![vec![text("Quarterly targets")]; row];
        rows.push(vec![
            text("Sales Person"),
            text("Territory"),
            text("Workbook Template"),
            text("Doc Template"),
            text("Target"),
        ]);
        rows.push(vec![
            text("Jane Doe"),
            text("West"),
            text("WB1.xlsx"),
            text("Master.docx"),
            CellValue::Number(1000.0),
        ]);
        Grid::new("Target Summary", rows)
    }

    #[test]
    fn header_is_found_at_any_row_below_the_bound() {
        for row in [0, 1, 7, 49] {
            assert_eq!(locate_header(&grid_with_header_at(row), "Sales Person", 50).unwrap(), row);
        }
    }

    #[test]
    fn header_beyond_the_bound_is_not_found() {
        for row in [50, 51, 80] {
            let error = locate_header(&grid_with_header_at(row), "Sales Person", 50).unwrap_err();
            assert!(matches!(error, ToolError::HeaderNotFound { depth: 50, .. }));
        }
    }

    #[test]
    fn first_matching_row_wins() {
        let grid = Grid::new(
            "Target Summary",
            vec![
                vec![CellValue::Empty, text("Sales Person")],
                vec![text("Sales Person")],
            ],
        );
        assert_eq!(locate_header(&grid, "Sales Person", 50).unwrap(), 0);
    }

    #[test]
    fn missing_required_columns_are_reported() {
        let grid = Grid::new(
            "Target Summary",
            vec![vec![text("Sales Person"), text("Territory")]],
        );
        let error = SourceTable::from_grid(&grid, &GeneratorConfig::default()).unwrap_err();
        match error {
            ToolError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["Workbook Template", "Doc Template"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_are_grouped_in_first_appearance_order() {
        let header = vec![
            text("Sales Person"),
            text("Territory"),
            text("Workbook Template"),
            text("Doc Template"),
        ];
        let row = |name: &str, territory: &str| {
            vec![text(name), text(territory), text("WB.xlsx"), text("Master.docx")]
        };
        let grid = Grid::new(
            "Target Summary",
            vec![
                header,
                row("Bob", "North"),
                row("Alice", "South"),
                vec![CellValue::Empty, text("Nowhere")],
                row("Bob", "East"),
            ],
        );

        let table = SourceTable::from_grid(&grid, &GeneratorConfig::default()).unwrap();
        let groups = table.group_by_recipient();

        assert_eq!(table.rows.len(), 3);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].recipient, "Bob");
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[0].authoritative().territory, text("North"));
        assert_eq!(groups[1].recipient, "Alice");
    }

    #[test]
    fn rows_are_padded_to_the_grid_width() {
        let table =
            SourceTable::from_grid(&grid_with_header_at(2), &GeneratorConfig::default()).unwrap();
        assert_eq!(table.header_row, 2);
        assert_eq!(table.rows[0].columns.len(), 5);
        assert_eq!(table.rows[0].columns[4], CellValue::Number(1000.0));
    }
}
