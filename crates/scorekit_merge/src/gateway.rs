//! Spreadsheet gateway seam plus the load/apply steps built on it.

use crate::parser::parse_sheet;
use crate::report::{EnumScoreEvent, ScoreObserver};
use crate::spec::{EnumCellWriteValue, ScoreError, SpecCellWrite, SpecScoreTable};

/// Read/write access to one opened workbook.
///
/// Rows and columns are 1-based. Rows returned by [`Self::get_rows`] start at
/// row 1 and column A and may be ragged.
pub trait SpreadsheetGateway {
    /// Label naming the workbook in diagnostics (usually its path).
    fn locator(&self) -> String;

    /// Name of the sheet at 0-based `sheet_index`.
    fn resolve_default_sheet(&self, sheet_index: usize) -> Result<String, ScoreError>;

    /// All rows of `sheet` as raw text.
    fn get_rows(&mut self, sheet: &str) -> Result<Vec<Vec<String>>, ScoreError>;

    fn set_cell_number(
        &mut self,
        sheet: &str,
        row: u32,
        column: u32,
        value: i64,
    ) -> Result<(), ScoreError>;

    fn set_cell_text(
        &mut self,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<(), ScoreError>;
}

/// Resolve the score sheet of `gateway` and parse it.
///
/// Returns the sheet name together with the table so writes can target it.
pub fn load_score_table<G, O>(
    gateway: &mut G,
    sheet_index: usize,
    skip_rows: usize,
    observer: &mut O,
) -> Result<(String, SpecScoreTable), ScoreError>
where
    G: SpreadsheetGateway + ?Sized,
    O: ScoreObserver + ?Sized,
{
    let sheet = gateway.resolve_default_sheet(sheet_index)?;
    let rows = gateway.get_rows(&sheet)?;
    let table = parse_sheet(&rows, skip_rows, &gateway.locator(), observer)?;
    Ok((sheet, table))
}

/// Apply merge writes to `sheet`; a failed write is reported and skipped.
///
/// Returns the number of failed writes.
pub fn apply_cell_writes<G, O>(
    gateway: &mut G,
    sheet: &str,
    writes: &[SpecCellWrite],
    observer: &mut O,
) -> usize
where
    G: SpreadsheetGateway + ?Sized,
    O: ScoreObserver + ?Sized,
{
    let mut n_failed = 0;
    for write in writes {
        let res_write = match &write.value {
            EnumCellWriteValue::Integer(n) => {
                gateway.set_cell_number(sheet, write.row, write.column, *n)
            }
            EnumCellWriteValue::Text(s) => gateway.set_cell_text(sheet, write.row, write.column, s),
        };
        if let Err(e) = res_write {
            n_failed += 1;
            observer.observe(&EnumScoreEvent::CellWriteFailed {
                locator: gateway.locator(),
                row: write.row,
                column: write.column,
                message: e.to_string(),
            });
        }
    }
    n_failed
}
