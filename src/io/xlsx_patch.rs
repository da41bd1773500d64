//! Writes cell values into an existing `.xlsx` package without disturbing the
//! parts it does not need to touch.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::column::{cell_reference, parse_cell_reference};
use crate::error::{Result, ToolError};
use crate::io::package::Package;
use crate::io::xml::{attribute_value, copy_without, prefixed_attribute_value};
use crate::model::CellValue;

const TAG_SHEET_DATA: &[u8] = b"sheetData";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_FORMULA: &[u8] = b"f";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_CALC_PROPERTIES: &[u8] = b"calcPr";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// A value destined for one cell, addressed by zero-based coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub row: u32,
    pub column: usize,
    pub value: CellValue,
}

/// Pending writes keyed by 1-based row number, then zero-based column.
type PendingRows = BTreeMap<u32, BTreeMap<usize, CellValue>>;

/// Applies `writes` to the sheet named `sheet` and returns the new package.
pub fn write_cells(template: &[u8], sheet: &str, writes: &[CellWrite]) -> Result<Vec<u8>> {
    let mut package = Package::from_bytes(template)?;

    let workbook_part = package
        .relationships("")?
        .into_iter()
        .find(|relationship| relationship.is_kind("officeDocument"))
        .map(|relationship| relationship.target)
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
    let workbook_xml = package.required_part(&workbook_part)?.to_vec();

    let relationship_id = find_sheet_relationship(&workbook_xml, sheet)?
        .ok_or_else(|| ToolError::MissingSheet(sheet.to_string()))?;
    let sheet_part = package
        .relationships(&workbook_part)?
        .into_iter()
        .find(|relationship| relationship.id == relationship_id)
        .map(|relationship| relationship.target)
        .ok_or_else(|| {
            ToolError::InvalidPackage(format!(
                "no relationship '{relationship_id}' for sheet '{sheet}'"
            ))
        })?;
    debug!(%sheet_part, write_count = writes.len(), "patching worksheet");

    let mut pending = PendingRows::new();
    for write in writes {
        pending
            .entry(write.row + 1)
            .or_default()
            .insert(write.column, write.value.clone());
    }

    let patched_sheet = patch_sheet_xml(package.required_part(&sheet_part)?, pending)?;
    package.replace_part(&sheet_part, patched_sheet)?;
    package.replace_part(&workbook_part, enable_full_calc_on_load(&workbook_xml)?)?;
    drop_calc_chain(&mut package, &workbook_part)?;
    package.to_bytes()
}

/// Removes the calculation chain. Written cells may have replaced formulas
/// that the chain still lists, and Excel rebuilds a missing chain on load.
fn drop_calc_chain(package: &mut Package, workbook_part: &str) -> Result<()> {
    let calc_chain = package
        .relationships(workbook_part)?
        .into_iter()
        .find(|relationship| relationship.is_kind("calcChain"));
    if let Some(relationship) = calc_chain {
        if package.remove_part(workbook_part, &relationship)? {
            debug!(part = %relationship.target, "removed calculation chain");
        }
    }
    Ok(())
}

fn find_sheet_relationship(workbook_xml: &[u8], sheet: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(workbook_xml);
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == TAG_SHEET =>
            {
                if attribute_value(&element, b"name")?.as_deref() == Some(sheet) {
                    return prefixed_attribute_value(&element, b"id");
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Sets `fullCalcOnLoad` on existing calculation properties so formulas that
/// depend on written cells refresh when the workbook is opened.
fn enable_full_calc_on_load(workbook_xml: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(workbook_xml);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len() + 32));
    loop {
        match reader.read_event()? {
            Event::Empty(element) if element.local_name().as_ref() == TAG_CALC_PROPERTIES => {
                let mut rewritten = copy_without(&element, b"fullCalcOnLoad")?;
                rewritten.push_attribute(("fullCalcOnLoad", "1"));
                writer.write_event(Event::Empty(rewritten))?;
            }
            Event::Start(element) if element.local_name().as_ref() == TAG_CALC_PROPERTIES => {
                let mut rewritten = copy_without(&element, b"fullCalcOnLoad")?;
                rewritten.push_attribute(("fullCalcOnLoad", "1"));
                writer.write_event(Event::Start(rewritten))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

/// Streams the worksheet XML, replacing or inserting the pending cells in
/// row and column order.
///
/// A replaced cell loses its formula. When that formula was the master of a
/// shared formula, the dependent cells keep their cached values and drop their
/// references to the removed master.
fn patch_sheet_xml(sheet_xml: &[u8], mut pending: PendingRows) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(sheet_xml);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len() + 1024));

    let mut names = ElementNames::default();
    let mut in_sheet_data = false;
    let mut row_cells: Option<BTreeMap<usize, CellValue>> = None;
    let mut current_row: u32 = 0;
    let mut last_column: Option<usize> = None;
    let mut orphaned_shared: BTreeSet<String> = BTreeSet::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                names = ElementNames::from_qualified(element.name());
                in_sheet_data = true;
                writer.write_event(event.borrow())?;
            }
            Event::Empty(element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                names = ElementNames::from_qualified(element.name());
                if pending.is_empty() {
                    writer.write_event(event.borrow())?;
                } else {
                    writer.write_event(Event::Start(element.borrow()))?;
                    write_rows(&mut writer, &names, std::mem::take(&mut pending))?;
                    writer.write_event(Event::End(element.to_end()))?;
                }
            }
            Event::End(element)
                if in_sheet_data && element.local_name().as_ref() == TAG_SHEET_DATA =>
            {
                write_rows(&mut writer, &names, std::mem::take(&mut pending))?;
                in_sheet_data = false;
                writer.write_event(event.borrow())?;
            }
            Event::Start(element) | Event::Empty(element)
                if in_sheet_data
                    && row_cells.is_none()
                    && element.local_name().as_ref() == TAG_ROW =>
            {
                current_row = match attribute_value(element, b"r")? {
                    Some(value) => value.parse().map_err(|_| {
                        ToolError::InvalidPackage(format!("invalid row number '{value}'"))
                    })?,
                    None => current_row + 1,
                };
                last_column = None;

                let later = pending.split_off(&current_row);
                write_rows(&mut writer, &names, std::mem::replace(&mut pending, later))?;

                let is_empty = matches!(event, Event::Empty(_));
                match pending.remove(&current_row) {
                    Some(cells) => {
                        writer.write_event(Event::Start(copy_without(element, b"spans")?))?;
                        if is_empty {
                            write_cells_in_order(&mut writer, &names, current_row, cells)?;
                            writer.write_event(Event::End(element.to_end()))?;
                        } else {
                            row_cells = Some(cells);
                        }
                    }
                    None => {
                        writer.write_event(event.borrow())?;
                        if !is_empty {
                            row_cells = Some(BTreeMap::new());
                        }
                    }
                }
            }
            Event::End(element)
                if row_cells.is_some() && element.local_name().as_ref() == TAG_ROW =>
            {
                let cells = row_cells.take().unwrap_or_default();
                write_cells_in_order(&mut writer, &names, current_row, cells)?;
                writer.write_event(event.borrow())?;
            }
            Event::Start(element) | Event::Empty(element)
                if row_cells.is_some() && element.local_name().as_ref() == TAG_CELL =>
            {
                let column = match attribute_value(element, b"r")? {
                    Some(reference) => parse_cell_reference(&reference)?.1,
                    None => last_column.map_or(0, |column| column + 1),
                };
                last_column = Some(column);

                let cells = row_cells.get_or_insert_with(BTreeMap::new);
                let later = cells.split_off(&column);
                let earlier = std::mem::replace(cells, later);
                let replacement = cells.remove(&column);
                write_cells_in_order(&mut writer, &names, current_row, earlier)?;

                match replacement {
                    Some(value) => {
                        let style = attribute_value(element, b"s")?;
                        write_cell(
                            &mut writer,
                            &names,
                            current_row,
                            column,
                            style.as_deref(),
                            &value,
                        )?;
                        if matches!(event, Event::Start(_)) {
                            orphaned_shared.extend(skip_cell(&mut reader, element.name())?);
                        }
                    }
                    None => writer.write_event(event.borrow())?,
                }
            }
            Event::Start(element) | Event::Empty(element)
                if row_cells.is_some()
                    && !orphaned_shared.is_empty()
                    && element.local_name().as_ref() == TAG_FORMULA =>
            {
                let orphaned = shared_formula(element)?
                    .is_some_and(|(index, _)| orphaned_shared.contains(&index));
                if !orphaned {
                    writer.write_event(event.borrow())?;
                } else if matches!(event, Event::Start(_)) {
                    reader.read_to_end(element.name())?;
                }
            }
            Event::Eof => break,
            _ => writer.write_event(event.borrow())?,
        }
    }

    Ok(writer.into_inner())
}

/// Consumes the content of a replaced cell up to its end tag and returns the
/// shared-formula index the cell was master of, if any.
fn skip_cell(reader: &mut Reader<&[u8]>, cell: QName<'_>) -> Result<Option<String>> {
    let mut master = None;
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == TAG_FORMULA =>
            {
                if let Some((index, true)) = shared_formula(&element)? {
                    master = Some(index);
                }
            }
            Event::End(element) if element.name() == cell => return Ok(master),
            Event::Eof => {
                return Err(ToolError::InvalidPackage(
                    "worksheet ended inside a cell".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Returns the shared index of a shared formula and whether the element is
/// its master (the one carrying the `ref` range).
fn shared_formula(element: &BytesStart<'_>) -> Result<Option<(String, bool)>> {
    if attribute_value(element, b"t")?.as_deref() != Some("shared") {
        return Ok(None);
    }
    let Some(index) = attribute_value(element, b"si")? else {
        return Ok(None);
    };
    Ok(Some((index, attribute_value(element, b"ref")?.is_some())))
}

/// Qualified element names matching the prefix used by the sheet.
#[derive(Debug, Clone)]
struct ElementNames {
    row: String,
    cell: String,
    value: String,
    inline: String,
    text: String,
}

impl Default for ElementNames {
    fn default() -> Self {
        Self::with_prefix(None)
    }
}

impl ElementNames {
    fn from_qualified(name: QName<'_>) -> Self {
        let prefix = name
            .prefix()
            .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned());
        Self::with_prefix(prefix.as_deref())
    }

    fn with_prefix(prefix: Option<&str>) -> Self {
        let qualify = |local: &str| match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        };
        Self {
            row: qualify("row"),
            cell: qualify("c"),
            value: qualify("v"),
            inline: qualify("is"),
            text: qualify("t"),
        }
    }
}

fn write_rows(
    writer: &mut Writer<Vec<u8>>,
    names: &ElementNames,
    rows: PendingRows,
) -> Result<()> {
    for (row, cells) in rows {
        let mut start = BytesStart::new(names.row.as_str());
        start.push_attribute(("r", row.to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        write_cells_in_order(writer, names, row, cells)?;
        writer.write_event(Event::End(BytesEnd::new(names.row.as_str())))?;
    }
    Ok(())
}

fn write_cells_in_order(
    writer: &mut Writer<Vec<u8>>,
    names: &ElementNames,
    row: u32,
    cells: BTreeMap<usize, CellValue>,
) -> Result<()> {
    for (column, value) in cells {
        write_cell(writer, names, row, column, None, &value)?;
    }
    Ok(())
}

fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    names: &ElementNames,
    row: u32,
    column: usize,
    style: Option<&str>,
    value: &CellValue,
) -> Result<()> {
    let mut start = BytesStart::new(names.cell.as_str());
    start.push_attribute(("r", cell_reference(row - 1, column).as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }

    let (kind, body) = match value {
        CellValue::Empty => {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        CellValue::Number(number) | CellValue::DateTime(number) => (None, number.to_string()),
        CellValue::Bool(flag) => (Some("b"), if *flag { "1" } else { "0" }.to_string()),
        CellValue::Text(text) => (Some("inlineStr"), text.clone()),
    };

    if let Some(kind) = kind {
        start.push_attribute(("t", kind));
    }
    writer.write_event(Event::Start(start))?;
    if kind == Some("inlineStr") {
        writer.write_event(Event::Start(BytesStart::new(names.inline.as_str())))?;
        let mut text = BytesStart::new(names.text.as_str());
        text.push_attribute(("xml:space", "preserve"));
        writer.write_event(Event::Start(text))?;
        writer.write_event(Event::Text(BytesText::new(&body)))?;
        writer.write_event(Event::End(BytesEnd::new(names.text.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new(names.inline.as_str())))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(names.value.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(&body)))?;
        writer.write_event(Event::End(BytesEnd::new(names.value.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(names.cell.as_str())))?;
    Ok(())
}
