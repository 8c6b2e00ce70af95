//! Worksheet XML patching and ZIP re-packing.
//!
//! Only patched worksheet parts are re-encoded; every other package entry is
//! raw-copied, so styles, merged ranges and other sheets stay byte-identical.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use scorekit_merge::{EnumCellWriteValue, derive_cell_axis};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::conf::{C_PART_WORKBOOK, C_PART_WORKBOOK_RELS};
use crate::spec::XlsxError;
use crate::util::{resolve_part_target, split_cell_reference};

/// Pending cell values of one worksheet, keyed by `(row, column)`.
pub(crate) type TypeCellPatches = BTreeMap<(u32, u32), EnumCellWriteValue>;

////////////////////////////////////////////////////////////////////////////////
// #region PackageParts

/// Worksheet part names in workbook tab order, as `(sheet name, part name)`.
pub(crate) fn read_sheet_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(String, String)>, XlsxError> {
    let dict_rels = read_workbook_relationships(archive)?;
    let xml_workbook = read_part(archive, C_PART_WORKBOOK)?;

    let mut reader = Reader::from_reader(xml_workbook.as_slice());
    let mut buf = Vec::new();
    let mut l_sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name_sheet = String::new();
                let mut id_rel = String::new();
                for attr in e.attributes().flatten() {
                    let key = attr.key;
                    if key.as_ref() == b"name" {
                        name_sheet = attr.unescape_value()?.into_owned();
                    } else if key.local_name().as_ref() == b"id" && key.prefix().is_some() {
                        id_rel = attr.unescape_value()?.into_owned();
                    }
                }
                let name_part = dict_rels
                    .get(&id_rel)
                    .cloned()
                    .ok_or_else(|| XlsxError::SheetPartNotFound(name_sheet.clone()))?;
                l_sheets.push((name_sheet, name_part));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(l_sheets)
}

fn read_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<HashMap<String, String>, XlsxError> {
    let xml_rels = read_part(archive, C_PART_WORKBOOK_RELS)?;

    let mut reader = Reader::from_reader(xml_rels.as_slice());
    let mut buf = Vec::new();
    let mut dict_rels = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id_rel = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id_rel = attr.unescape_value()?.into_owned(),
                        b"Target" => target = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }
                if !id_rel.is_empty() && !target.is_empty() {
                    dict_rels.insert(id_rel, resolve_part_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(dict_rels)
}

pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name_part: &str,
) -> Result<Vec<u8>, XlsxError> {
    let mut file = archive.by_name(name_part)?;
    let mut v_bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut v_bytes)
        .map_err(|e| XlsxError::Zip(zip::result::ZipError::Io(e)))?;
    Ok(v_bytes)
}

/// Re-pack `original` with the worksheet parts in `dict_patches` rewritten.
pub(crate) fn patch_package(
    original: &[u8],
    dict_patches: &HashMap<String, TypeCellPatches>,
) -> Result<Vec<u8>, XlsxError> {
    let mut archive = ZipArchive::new(Cursor::new(original))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(original.len())));

    for n_idx in 0..archive.len() {
        let name_part = archive.by_index_raw(n_idx)?.name().to_string();
        if let Some(dict_cells) = dict_patches.get(&name_part) {
            let xml_sheet = read_part(&mut archive, &name_part)?;
            let xml_patched = patch_worksheet_xml(&xml_sheet, dict_cells)?;
            let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(name_part.as_str(), options)?;
            writer
                .write_all(&xml_patched)
                .map_err(|e| XlsxError::Zip(zip::result::ZipError::Io(e)))?;
            continue;
        }
        writer.raw_copy_file(archive.by_index_raw(n_idx)?)?;
    }

    Ok(writer.finish()?.into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorksheetXml

/// Streaming state while rewriting one worksheet.
struct SpecSheetPatchState {
    c_prefix: String,
    dict_rows_pending: BTreeMap<u32, BTreeMap<u32, EnumCellWriteValue>>,
    dict_cells_row: BTreeMap<u32, EnumCellWriteValue>,
    n_row_last: u32,
    n_col_last: u32,
    n_depth_skip: usize,
}

impl SpecSheetPatchState {
    fn tag(&self, name_local: &str) -> String {
        format!("{}{name_local}", self.c_prefix)
    }

    /// Pending rows numbered below `n_row`, removed from the queue.
    fn take_rows_before(&mut self, n_row: u32) -> Vec<(u32, BTreeMap<u32, EnumCellWriteValue>)> {
        let dict_rest = self.dict_rows_pending.split_off(&n_row);
        std::mem::replace(&mut self.dict_rows_pending, dict_rest)
            .into_iter()
            .collect()
    }

    /// Pending cells of the open row numbered below `n_col`, removed from the queue.
    fn take_cells_before(&mut self, n_col: u32) -> Vec<(u32, EnumCellWriteValue)> {
        let dict_rest = self.dict_cells_row.split_off(&n_col);
        std::mem::replace(&mut self.dict_cells_row, dict_rest)
            .into_iter()
            .collect()
    }
}

/// Rewrite worksheet XML so each patched cell holds its new value.
///
/// Existing cells keep every attribute except the value type, so the cell
/// style survives. Missing cells and rows are inserted in order.
pub(crate) fn patch_worksheet_xml(
    xml_sheet: &[u8],
    dict_cells: &TypeCellPatches,
) -> Result<Vec<u8>, XlsxError> {
    let mut dict_rows_pending: BTreeMap<u32, BTreeMap<u32, EnumCellWriteValue>> = BTreeMap::new();
    for ((n_row, n_col), value) in dict_cells {
        dict_rows_pending
            .entry(*n_row)
            .or_default()
            .insert(*n_col, value.clone());
    }

    let mut state = SpecSheetPatchState {
        c_prefix: String::new(),
        dict_rows_pending,
        dict_cells_row: BTreeMap::new(),
        n_row_last: 0,
        n_col_last: 0,
        n_depth_skip: 0,
    };

    let mut reader = Reader::from_reader(xml_sheet);
    let mut writer = Writer::new(Vec::with_capacity(xml_sheet.len() + 256));
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if state.n_depth_skip > 0 {
            match event {
                Event::Start(_) => state.n_depth_skip += 1,
                Event::End(_) => state.n_depth_skip -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                state.c_prefix = derive_prefix(&e);
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                state.c_prefix = derive_prefix(&e);
                if state.dict_rows_pending.is_empty() {
                    writer.write_event(Event::Empty(e))?;
                } else {
                    writer.write_event(Event::Start(e))?;
                    for (n_row, dict_row) in state.take_rows_before(u32::MAX) {
                        write_row(&mut writer, &state, n_row, &dict_row)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(state.tag("sheetData"))))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                for (n_row, dict_row) in state.take_rows_before(u32::MAX) {
                    write_row(&mut writer, &state, n_row, &dict_row)?;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let n_row = derive_row_number(&e, state.n_row_last)?;
                for (n_row_before, dict_row) in state.take_rows_before(n_row) {
                    write_row(&mut writer, &state, n_row_before, &dict_row)?;
                }
                state.n_row_last = n_row;
                state.n_col_last = 0;
                state.dict_cells_row = state.dict_rows_pending.remove(&n_row).unwrap_or_default();
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let n_row = derive_row_number(&e, state.n_row_last)?;
                for (n_row_before, dict_row) in state.take_rows_before(n_row) {
                    write_row(&mut writer, &state, n_row_before, &dict_row)?;
                }
                state.n_row_last = n_row;
                match state.dict_rows_pending.remove(&n_row) {
                    Some(dict_row) => {
                        writer.write_event(Event::Start(e))?;
                        for (n_col, value) in &dict_row {
                            write_cell(&mut writer, &state, None, n_row, *n_col, value)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new(state.tag("row"))))?;
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                let n_row = state.n_row_last;
                for (n_col, value) in state.take_cells_before(u32::MAX) {
                    write_cell(&mut writer, &state, None, n_row, n_col, &value)?;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e)
                if e.local_name().as_ref() == b"c" && !state.dict_cells_row.is_empty() =>
            {
                patch_existing_cell(&mut writer, &mut state, e, true)?;
            }
            Event::Empty(e)
                if e.local_name().as_ref() == b"c" && !state.dict_cells_row.is_empty() =>
            {
                patch_existing_cell(&mut writer, &mut state, e, false)?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                state.n_col_last = derive_col_number(&e, state.n_col_last)?;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                state.n_col_last = derive_col_number(&e, state.n_col_last)?;
                writer.write_event(Event::Empty(e))?;
            }
            event => writer.write_event(event)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn patch_existing_cell(
    writer: &mut Writer<Vec<u8>>,
    state: &mut SpecSheetPatchState,
    e: BytesStart<'_>,
    b_has_content: bool,
) -> Result<(), XlsxError> {
    let n_row = state.n_row_last;
    let n_col = derive_col_number(&e, state.n_col_last)?;
    state.n_col_last = n_col;

    for (n_col_before, value) in state.take_cells_before(n_col) {
        write_cell(writer, state, None, n_row, n_col_before, &value)?;
    }

    match state.dict_cells_row.remove(&n_col) {
        Some(value) => {
            write_cell(writer, state, Some(&e), n_row, n_col, &value)?;
            if b_has_content {
                state.n_depth_skip = 1;
            }
        }
        None if b_has_content => writer.write_event(Event::Start(e))?,
        None => writer.write_event(Event::Empty(e))?,
    }
    Ok(())
}

fn write_row(
    writer: &mut Writer<Vec<u8>>,
    state: &SpecSheetPatchState,
    n_row: u32,
    dict_row: &BTreeMap<u32, EnumCellWriteValue>,
) -> Result<(), XlsxError> {
    let mut elem_row = BytesStart::new(state.tag("row"));
    elem_row.push_attribute(("r", n_row.to_string().as_str()));
    writer.write_event(Event::Start(elem_row))?;
    for (n_col, value) in dict_row {
        write_cell(writer, state, None, n_row, *n_col, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(state.tag("row"))))?;
    Ok(())
}

/// Write one `<c>` element; `elem_orig` supplies the attributes to keep.
fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    state: &SpecSheetPatchState,
    elem_orig: Option<&BytesStart<'_>>,
    n_row: u32,
    n_col: u32,
    value: &EnumCellWriteValue,
) -> Result<(), XlsxError> {
    let mut elem_cell = BytesStart::new(state.tag("c"));
    match elem_orig {
        Some(e) => {
            for attr in e.attributes().flatten() {
                if attr.key.as_ref() != b"t" {
                    elem_cell.push_attribute(attr);
                }
            }
        }
        None => {
            let c_axis = derive_cell_axis(n_row, n_col)
                .map_err(|_| XlsxError::InvalidCellReference(format!("R{n_row}C{n_col}")))?;
            elem_cell.push_attribute(("r", c_axis.as_str()));
        }
    }

    match value {
        EnumCellWriteValue::Integer(n) => {
            writer.write_event(Event::Start(elem_cell))?;
            writer.write_event(Event::Start(BytesStart::new(state.tag("v"))))?;
            writer.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new(state.tag("v"))))?;
        }
        EnumCellWriteValue::Text(s) => {
            elem_cell.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(elem_cell))?;
            writer.write_event(Event::Start(BytesStart::new(state.tag("is"))))?;
            let mut elem_text = BytesStart::new(state.tag("t"));
            if s.trim() != s {
                elem_text.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(elem_text))?;
            writer.write_event(Event::Text(BytesText::new(s)))?;
            writer.write_event(Event::End(BytesEnd::new(state.tag("t"))))?;
            writer.write_event(Event::End(BytesEnd::new(state.tag("is"))))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(state.tag("c"))))?;
    Ok(())
}

fn derive_prefix(e: &BytesStart<'_>) -> String {
    match e.name().prefix() {
        Some(prefix) => format!("{}:", String::from_utf8_lossy(prefix.as_ref())),
        None => String::new(),
    }
}

fn read_attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Row number from `r`, or the row after `n_row_last` when `r` is absent.
fn derive_row_number(e: &BytesStart<'_>, n_row_last: u32) -> Result<u32, XlsxError> {
    match read_attr(e, b"r")? {
        Some(c_row) => c_row
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(XlsxError::InvalidCellReference(c_row)),
        None => Ok(n_row_last + 1),
    }
}

/// Column number from `r`, or the column after `n_col_last` when `r` is absent.
fn derive_col_number(e: &BytesStart<'_>, n_col_last: u32) -> Result<u32, XlsxError> {
    match read_attr(e, b"r")? {
        Some(c_ref) => Ok(split_cell_reference(&c_ref)?.1),
        None => Ok(n_col_last + 1),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(xml: &str, l_cells: &[((u32, u32), EnumCellWriteValue)]) -> String {
        let dict_cells: TypeCellPatches = l_cells.iter().cloned().collect();
        let v_out = patch_worksheet_xml(xml.as_bytes(), &dict_cells).expect("patch");
        String::from_utf8(v_out).expect("utf8")
    }

    fn int(n: i64) -> EnumCellWriteValue {
        EnumCellWriteValue::Integer(n)
    }

    fn text(s: &str) -> EnumCellWriteValue {
        EnumCellWriteValue::Text(s.to_string())
    }

    const C_HEAD: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#;

    #[test]
    fn patch_replaces_existing_cell_and_keeps_style() {
        let xml = format!(
            r#"{C_HEAD}<sheetData><row r="2"><c r="A2" t="s"><v>0</v></c><c r="D2" s="3" t="s"><v>1</v></c></row></sheetData></worksheet>"#
        );
        let out = patch(&xml, &[((2, 4), int(90))]);
        assert_eq!(
            out,
            format!(
                r#"{C_HEAD}<sheetData><row r="2"><c r="A2" t="s"><v>0</v></c><c r="D2" s="3"><v>90</v></c></row></sheetData></worksheet>"#
            )
        );
    }

    #[test]
    fn patch_inserts_cells_in_column_order() {
        let xml = format!(
            r#"{C_HEAD}<sheetData><row r="2"><c r="B2"><v>1</v></c><c r="E2" s="1"/></row></sheetData></worksheet>"#
        );
        let out = patch(
            &xml,
            &[((2, 1), int(7)), ((2, 4), text("缺考")), ((2, 5), int(5)), ((2, 6), int(6))],
        );
        assert_eq!(
            out,
            format!(
                r#"{C_HEAD}<sheetData><row r="2"><c r="A2"><v>7</v></c><c r="B2"><v>1</v></c><c r="D2" t="inlineStr"><is><t>缺考</t></is></c><c r="E2" s="1"><v>5</v></c><c r="F2"><v>6</v></c></row></sheetData></worksheet>"#
            )
        );
    }

    #[test]
    fn patch_inserts_missing_rows() {
        let xml = format!(
            r#"{C_HEAD}<sheetData><row r="2"><c r="A2"><v>1</v></c></row><row r="5" ht="20"/></sheetData></worksheet>"#
        );
        let out = patch(&xml, &[((1, 1), int(1)), ((5, 2), int(2)), ((9, 3), text(" a "))]);
        assert_eq!(
            out,
            format!(
                r#"{C_HEAD}<sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="2"><c r="A2"><v>1</v></c></row><row r="5" ht="20"><c r="B5"><v>2</v></c></row><row r="9"><c r="C9" t="inlineStr"><is><t xml:space="preserve"> a </t></is></c></row></sheetData></worksheet>"#
            )
        );
    }

    #[test]
    fn patch_fills_empty_sheet_data_and_escapes_text() {
        let xml = format!(r#"{C_HEAD}<sheetData/></worksheet>"#);
        let out = patch(&xml, &[((1, 1), text("A&B"))]);
        assert_eq!(
            out,
            format!(
                r#"{C_HEAD}<sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>A&amp;B</t></is></c></row></sheetData></worksheet>"#
            )
        );
    }

    #[test]
    fn patch_tracks_rows_and_cells_without_references() {
        let xml = format!(
            r#"{C_HEAD}<sheetData><row><c><v>1</v></c></row><row><c><v>2</v></c><c><f>A1</f><v>3</v></c></row></sheetData></worksheet>"#
        );
        let out = patch(&xml, &[((2, 2), int(8))]);
        assert_eq!(
            out,
            format!(
                r#"{C_HEAD}<sheetData><row><c><v>1</v></c></row><row><c><v>2</v></c><c><v>8</v></c></row></sheetData></worksheet>"#
            )
        );
    }

    #[test]
    fn patch_keeps_namespace_prefix() {
        let xml = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData></x:sheetData></x:worksheet>"#;
        let out = patch(xml, &[((1, 2), int(3))]);
        assert_eq!(
            out,
            r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData><x:row r="1"><x:c r="B1"><x:v>3</x:v></x:c></x:row></x:sheetData></x:worksheet>"#
        );
    }

    #[test]
    fn patch_rejects_malformed_reference() {
        let xml = format!(r#"{C_HEAD}<sheetData><row r="x"/></sheetData></worksheet>"#);
        let dict_cells: TypeCellPatches = [((1, 1), int(1))].into_iter().collect();
        let err = patch_worksheet_xml(xml.as_bytes(), &dict_cells).expect_err("bad row");
        assert!(matches!(err, XlsxError::InvalidCellReference(_)));
    }
}
