//! Score table models, merge outputs and top-level error types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region ScoreTableModel

/// Identity of one gradable cell. All fields are trimmed cell text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecStudentSubjectKey {
    /// Class name (column 3).
    pub class_name: String,
    /// Student name (column 2).
    pub student_name: String,
    /// Subject name (header text of a column from 4 onward).
    pub subject_name: String,
}

impl SpecStudentSubjectKey {
    pub fn new(
        class_name: impl Into<String>,
        student_name: impl Into<String>,
        subject_name: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            student_name: student_name.into(),
            subject_name: subject_name.into(),
        }
    }
}

impl fmt::Display for SpecStudentSubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.class_name, self.student_name, self.subject_name
        )
    }
}

/// Raw score text plus its 1-based position in the sheet it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecScoreCell {
    /// Trimmed cell text; empty when the cell was blank or missing.
    pub score_text: String,
    /// 1-based row.
    pub row: u32,
    /// 1-based column.
    pub column: u32,
}

impl SpecScoreCell {
    pub fn blank(row: u32, column: u32) -> Self {
        Self {
            score_text: String::new(),
            row,
            column,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.score_text.is_empty()
    }
}

/// Normalized in-memory form of one score sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecScoreTable {
    /// Workbook path or other label used in diagnostics.
    pub locator: String,
    /// Leading rows skipped before the header row.
    pub skip_rows: usize,
    /// Trimmed header row.
    pub headers: Vec<String>,
    /// Cells keyed by (class, student, subject).
    pub cells: BTreeMap<SpecStudentSubjectKey, SpecScoreCell>,
}

impl SpecScoreTable {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &SpecStudentSubjectKey) -> Option<&SpecScoreCell> {
        self.cells.get(key)
    }

    /// Non-empty score text for `key`, if any.
    pub fn score_of(&self, key: &SpecStudentSubjectKey) -> Option<&str> {
        self.cells
            .get(key)
            .filter(|cell| !cell.is_blank())
            .map(|cell| cell.score_text.as_str())
    }

    /// Subject header names, in column order.
    pub fn subjects(&self) -> &[String] {
        self.headers
            .get(crate::conf::N_COLS_STUDENT_INFO..)
            .unwrap_or_default()
    }

    /// Distinct (class, student) pairs present in the table.
    pub fn students(&self) -> BTreeSet<(&str, &str)> {
        self.cells
            .keys()
            .map(|key| (key.class_name.as_str(), key.student_name.as_str()))
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergeOutputs

/// Tie-breaking rule used when a numeric score is rounded to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumRoundingRule {
    /// `87.5 -> 88`, `-2.5 -> -3` (default).
    #[default]
    HalfAwayFromZero,
    /// `87.5 -> 88`, `86.5 -> 86`.
    HalfToEven,
}

/// Value written back into the result sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumCellWriteValue {
    /// Rounded numeric score.
    Integer(i64),
    /// Non-numeric marker, copied verbatim.
    Text(String),
}

impl fmt::Display for EnumCellWriteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One cell write targeting the result sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCellWrite {
    /// 1-based row in the result sheet.
    pub row: u32,
    /// 1-based column in the result sheet.
    pub column: u32,
    /// Value to write.
    pub value: EnumCellWriteValue,
}

/// Merge result: updated result table and the writes to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeOutcome {
    /// Result table with merged score texts.
    pub table: SpecScoreTable,
    /// Writes in key order.
    pub writes: Vec<SpecCellWrite>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors that abort loading a sheet or running a merge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Invalid column number: {0} (must be >= 1)")]
    InvalidColumn(u32),

    #[error("Invalid column name: {0:?}")]
    InvalidColumnName(String),

    #[error("Invalid row number: {0} (must be >= 1)")]
    InvalidRow(u32),

    #[error("File {locator:?} has a blank header cell, headers: {headers:?}")]
    MalformedHeader {
        locator: String,
        headers: Vec<String>,
    },

    #[error("File {locator:?} has fewer than 4 header columns, is there any data? headers: {headers:?}")]
    InsufficientColumns {
        locator: String,
        headers: Vec<String>,
    },

    #[error("At least one source score sheet is required")]
    NoSources,

    #[error("Failed to read sheet from {locator:?}: {message}")]
    SheetRead { locator: String, message: String },

    #[error("Failed to write cell {cell} in {locator:?}: {message}")]
    CellWrite {
        locator: String,
        cell: String,
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
