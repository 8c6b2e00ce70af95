//! Stateless helpers: cell text rendering, cell references and paths.

use std::path::{Path, PathBuf};

use calamine::{Data, Range};
use scorekit_merge::column_name_to_number;

use crate::conf::{C_PART_DIR_XL, N_NUM_WORKERS_DEFAULT};
use crate::spec::XlsxError;

////////////////////////////////////////////////////////////////////////////////
// #region CellText

/// Render one decoded cell as the text the parser sees.
///
/// Whole floats drop their fraction (`90.0 -> "90"`); booleans use Excel's
/// `TRUE`/`FALSE`.
pub fn convert_data_to_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(v) => format!("{v}"),
        Data::Int(v) => format!("{v}"),
        Data::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        other => other.to_string(),
    }
}

/// Expand a used range into rows anchored at `A1`.
///
/// Rows and columns in front of the used range are padded with empty cells;
/// trailing empty cells are trimmed per row.
pub fn derive_rows_from_range(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((n_row_start, n_col_start)) = range.start() else {
        return Vec::new();
    };

    let mut l_rows: Vec<Vec<String>> = (0..n_row_start).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut l_cells: Vec<String> = (0..n_col_start).map(|_| String::new()).collect();
        l_cells.extend(row.iter().map(convert_data_to_text));
        trim_trailing_empty_cells(&mut l_cells);
        l_rows.push(l_cells);
    }
    l_rows
}

pub fn trim_trailing_empty_cells(cells: &mut Vec<String>) {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region References

/// Split an A1 reference such as `"AB12"` into `(row, column)`, both 1-based.
pub fn split_cell_reference(reference: &str) -> Result<(u32, u32), XlsxError> {
    let n_split = reference
        .find(|ch: char| ch.is_ascii_digit())
        .ok_or_else(|| XlsxError::InvalidCellReference(reference.to_string()))?;
    let (c_col, c_row) = reference.split_at(n_split);

    let n_col = column_name_to_number(c_col)
        .map_err(|_| XlsxError::InvalidCellReference(reference.to_string()))?;
    let n_row = c_row
        .parse::<u32>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| XlsxError::InvalidCellReference(reference.to_string()))?;
    Ok((n_row, n_col))
}

/// Resolve a workbook relationship target to a package part name.
pub(crate) fn resolve_part_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => format!("{C_PART_DIR_XL}{target}"),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathsAndWorkers

/// Default output path: `prefix` + result file name, in the result's directory.
pub fn derive_output_path(path_result: &Path, prefix: &str) -> PathBuf {
    let name_file = path_result
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path_result.with_file_name(format!("{prefix}{name_file}"))
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, N_NUM_WORKERS_DEFAULT),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
