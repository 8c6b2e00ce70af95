//! Raw sheet rows -> [`SpecScoreTable`].
//!
//! Expected layout (after `skip_rows` title rows):
//!
//! ```text
//! | 序号 | 姓名 | 语言班 | 语言课1 | 语言课2 | 专业课1 | ...
//!   A      B      C       D        E        F
//! ```
//!
//! Columns 1..=3 are sequence, student and class; every column from 4 onward
//! is one subject.

use std::collections::BTreeMap;

use crate::conf::{N_COL_CLASS_NAME, N_COL_STUDENT_NAME, N_COLS_HEADER_MIN, N_COLS_STUDENT_INFO};
use crate::report::{EnumScoreEvent, ScoreObserver};
use crate::spec::{ScoreError, SpecScoreCell, SpecScoreTable, SpecStudentSubjectKey};

/// Parse raw rows of one sheet into a score table.
///
/// Only the header row can fail the parse (`MalformedHeader`,
/// `InsufficientColumns`); row-level anomalies are reported to `observer`
/// and skipped.
pub fn parse_sheet<O>(
    rows: &[Vec<String>],
    skip_rows: usize,
    locator: &str,
    observer: &mut O,
) -> Result<SpecScoreTable, ScoreError>
where
    O: ScoreObserver + ?Sized,
{
    let l_rows_rest = rows.get(skip_rows..).unwrap_or_default();
    let Some((row_header, l_rows_data)) = l_rows_rest.split_first() else {
        return Err(ScoreError::InsufficientColumns {
            locator: locator.to_string(),
            headers: Vec::new(),
        });
    };

    let headers: Vec<String> = row_header.iter().map(|c| c.trim().to_string()).collect();
    if headers.iter().any(String::is_empty) {
        return Err(ScoreError::MalformedHeader {
            locator: locator.to_string(),
            headers,
        });
    }
    if headers.len() < N_COLS_HEADER_MIN {
        return Err(ScoreError::InsufficientColumns {
            locator: locator.to_string(),
            headers,
        });
    }

    let mut table = SpecScoreTable {
        locator: locator.to_string(),
        skip_rows,
        headers,
        cells: BTreeMap::new(),
    };

    for (n_idx_row, row) in l_rows_data.iter().enumerate() {
        // header sits on row `skip_rows + 1`
        let n_row = to_u32(skip_rows + n_idx_row + 2);
        parse_data_row(&mut table, row, n_row, observer);
    }

    observer.observe(&EnumScoreEvent::SheetLoaded {
        locator: table.locator.clone(),
        n_headers: table.headers.len(),
        n_students: table.students().len(),
        n_keys: table.len(),
    });
    Ok(table)
}

fn parse_data_row<O>(table: &mut SpecScoreTable, row: &[String], n_row: u32, observer: &mut O)
where
    O: ScoreObserver + ?Sized,
{
    if row.len() < N_COLS_STUDENT_INFO {
        observer.observe(&EnumScoreEvent::RowSkippedShort {
            locator: table.locator.clone(),
            row: n_row,
            n_cells: row.len(),
        });
        return;
    }
    let row = &row[..usize::min(row.len(), table.headers.len())];

    let student_name = row[N_COL_STUDENT_NAME - 1].trim();
    let class_name = row[N_COL_CLASS_NAME - 1].trim();
    if class_name.is_empty() || student_name.is_empty() {
        observer.observe(&EnumScoreEvent::RowSkippedMissingStudent {
            locator: table.locator.clone(),
            row: n_row,
            class_name: class_name.to_string(),
            student_name: student_name.to_string(),
        });
        return;
    }

    let key_first_subject = SpecStudentSubjectKey::new(
        class_name,
        student_name,
        table.headers[N_COLS_STUDENT_INFO].as_str(),
    );
    if table.cells.contains_key(&key_first_subject) {
        observer.observe(&EnumScoreEvent::DuplicateStudentRow {
            locator: table.locator.clone(),
            row: n_row,
            class_name: class_name.to_string(),
            student_name: student_name.to_string(),
        });
    }

    // every subject gets a key, even when this row is shorter than the header
    for (n_idx_col, subject_name) in table
        .headers
        .iter()
        .enumerate()
        .skip(N_COLS_STUDENT_INFO)
    {
        table.cells.insert(
            SpecStudentSubjectKey::new(class_name, student_name, subject_name.as_str()),
            SpecScoreCell::blank(n_row, to_u32(n_idx_col + 1)),
        );
    }

    for (n_idx_col, raw_score) in row.iter().enumerate().skip(N_COLS_STUDENT_INFO) {
        let n_col = to_u32(n_idx_col + 1);
        let subject_name = table.headers[n_idx_col].clone();
        if subject_name.is_empty() {
            observer.observe(&EnumScoreEvent::SubjectMissing {
                locator: table.locator.clone(),
                row: n_row,
                column: n_col,
                class_name: class_name.to_string(),
                student_name: student_name.to_string(),
            });
            continue;
        }

        let key = SpecStudentSubjectKey::new(class_name, student_name, subject_name);
        let score_text = raw_score.trim();
        if score_text.is_empty() {
            // a repeated subject column takes the key even when blank
            table
                .cells
                .insert(key.clone(), SpecScoreCell::blank(n_row, n_col));
            observer.observe(&EnumScoreEvent::ScoreBlank {
                locator: table.locator.clone(),
                row: n_row,
                column: n_col,
                key,
            });
            continue;
        }

        observer.observe(&EnumScoreEvent::ScoreLoaded {
            locator: table.locator.clone(),
            row: n_row,
            column: n_col,
            key: key.clone(),
            score_text: score_text.to_string(),
        });
        table.cells.insert(
            key,
            SpecScoreCell {
                score_text: score_text.to_string(),
                row: n_row,
                column: n_col,
            },
        );
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
