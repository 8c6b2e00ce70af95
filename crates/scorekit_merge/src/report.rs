//! Per-cell events, observers and the merge report.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use log::Level;

use crate::conf::C_LOG_TARGET;
use crate::spec::{EnumCellWriteValue, SpecStudentSubjectKey};
use crate::util::format_cell_axis;

////////////////////////////////////////////////////////////////////////////////
// #region Events

/// One parse/merge decision worth auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumScoreEvent {
    /// Sheet parsed into a score table.
    SheetLoaded {
        locator: String,
        n_headers: usize,
        n_students: usize,
        n_keys: usize,
    },
    /// Row has fewer than the three student-info cells.
    RowSkippedShort {
        locator: String,
        row: u32,
        n_cells: usize,
    },
    /// Row has a blank student or class name.
    RowSkippedMissingStudent {
        locator: String,
        row: u32,
        class_name: String,
        student_name: String,
    },
    /// (class, student) pair seen again; this row replaces the earlier one.
    DuplicateStudentRow {
        locator: String,
        row: u32,
        class_name: String,
        student_name: String,
    },
    /// Data cell sits under a blank header cell.
    SubjectMissing {
        locator: String,
        row: u32,
        column: u32,
        class_name: String,
        student_name: String,
    },
    /// Score cell is blank.
    ScoreBlank {
        locator: String,
        row: u32,
        column: u32,
        key: SpecStudentSubjectKey,
    },
    /// Score cell loaded.
    ScoreLoaded {
        locator: String,
        row: u32,
        column: u32,
        key: SpecStudentSubjectKey,
        score_text: String,
    },
    /// Result cell filled from the first source holding a value.
    ScoreFilled {
        key: SpecStudentSubjectKey,
        source_index: usize,
        source_locator: String,
        row: u32,
        column: u32,
        value: EnumCellWriteValue,
    },
    /// No source holds a value for this result cell.
    ScoreUnmatched {
        key: SpecStudentSubjectKey,
        row: u32,
        column: u32,
    },
    /// Writing one merged value back failed.
    CellWriteFailed {
        locator: String,
        row: u32,
        column: u32,
        message: String,
    },
}

impl EnumScoreEvent {
    /// Log level the event is reported at.
    pub fn level(&self) -> Level {
        match self {
            Self::SheetLoaded { .. } => Level::Info,
            Self::RowSkippedShort { .. }
            | Self::RowSkippedMissingStudent { .. }
            | Self::DuplicateStudentRow { .. }
            | Self::SubjectMissing { .. }
            | Self::CellWriteFailed { .. } => Level::Warn,
            Self::ScoreBlank { .. } | Self::ScoreFilled { .. } | Self::ScoreUnmatched { .. } => {
                Level::Debug
            }
            Self::ScoreLoaded { .. } => Level::Trace,
        }
    }
}

impl fmt::Display for EnumScoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SheetLoaded {
                locator,
                n_headers,
                n_students,
                n_keys,
            } => write!(
                f,
                "Loaded {locator:?}: headers={n_headers} students={n_students} keys={n_keys}"
            ),
            Self::RowSkippedShort {
                locator,
                row,
                n_cells,
            } => write!(
                f,
                "Missing data, row skipped: {locator:?} row={row} cells={n_cells}"
            ),
            Self::RowSkippedMissingStudent {
                locator,
                row,
                class_name,
                student_name,
            } => write!(
                f,
                "Missing student info, row skipped: {locator:?} row={row} class={class_name:?} student={student_name:?}"
            ),
            Self::DuplicateStudentRow {
                locator,
                row,
                class_name,
                student_name,
            } => write!(
                f,
                "Duplicate student row replaces earlier one: {locator:?} row={row} class={class_name:?} student={student_name:?}"
            ),
            Self::SubjectMissing {
                locator,
                row,
                column,
                class_name,
                student_name,
            } => write!(
                f,
                "Missing subject, column skipped: {locator:?} cell={} class={class_name:?} student={student_name:?}",
                format_cell_axis(*row, *column)
            ),
            Self::ScoreBlank {
                locator,
                row,
                column,
                key,
            } => write!(
                f,
                "Blank score: {locator:?} cell={} key={key}",
                format_cell_axis(*row, *column)
            ),
            Self::ScoreLoaded {
                locator,
                row,
                column,
                key,
                score_text,
            } => write!(
                f,
                "Score loaded: {locator:?} cell={} key={key} score={score_text:?}",
                format_cell_axis(*row, *column)
            ),
            Self::ScoreFilled {
                key,
                source_index,
                source_locator,
                row,
                column,
                value,
            } => write!(
                f,
                "Score filled: cell={} key={key} value={value} source[{source_index}]={source_locator:?}",
                format_cell_axis(*row, *column)
            ),
            Self::ScoreUnmatched { key, row, column } => write!(
                f,
                "No source score: cell={} key={key}",
                format_cell_axis(*row, *column)
            ),
            Self::CellWriteFailed {
                locator,
                row,
                column,
                message,
            } => write!(
                f,
                "Failed to set score: {locator:?} cell={} ({message})",
                format_cell_axis(*row, *column)
            ),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Observers

/// Receiver of parse/merge events, injected into the parser and merge engine.
pub trait ScoreObserver {
    fn observe(&mut self, event: &EnumScoreEvent);
}

impl<T: ScoreObserver + ?Sized> ScoreObserver for &mut T {
    fn observe(&mut self, event: &EnumScoreEvent) {
        (**self).observe(event);
    }
}

impl<A: ScoreObserver, B: ScoreObserver> ScoreObserver for (A, B) {
    fn observe(&mut self, event: &EnumScoreEvent) {
        self.0.observe(event);
        self.1.observe(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScoreObserver for NoopObserver {
    fn observe(&mut self, _event: &EnumScoreEvent) {}
}

/// Forwards events to the `log` facade under target [`C_LOG_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ScoreObserver for LogObserver {
    fn observe(&mut self, event: &EnumScoreEvent) {
        log::log!(target: C_LOG_TARGET, event.level(), "{event}");
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Report

/// Aggregate counters and diagnostics for one merge run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportMerge {
    /// Number of sheets parsed (result + sources).
    pub cnt_sheets: u64,
    /// Data rows skipped for missing data or student info.
    pub cnt_rows_skipped: u64,
    /// Result cells filled from a source.
    pub cnt_filled: u64,
    /// Filled cells written as integers.
    pub cnt_numeric: u64,
    /// Filled cells written as text.
    pub cnt_text: u64,
    /// Result cells no source had a value for.
    pub cnt_unmatched: u64,
    /// Writes rejected by the spreadsheet gateway.
    pub cnt_write_failed: u64,
    /// Non-fatal warnings, in emission order.
    pub warnings: Vec<String>,
    /// Saved output workbook, when the run produced one.
    pub path_output: Option<PathBuf>,
}

impl ReportMerge {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_sheets".to_string(), self.cnt_sheets);
        dict_counts.insert("cnt_rows_skipped".to_string(), self.cnt_rows_skipped);
        dict_counts.insert("cnt_filled".to_string(), self.cnt_filled);
        dict_counts.insert("cnt_numeric".to_string(), self.cnt_numeric);
        dict_counts.insert("cnt_text".to_string(), self.cnt_text);
        dict_counts.insert("cnt_unmatched".to_string(), self.cnt_unmatched);
        dict_counts.insert("cnt_write_failed".to_string(), self.cnt_write_failed);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} sheets={} filled={} numeric={} text={} unmatched={} rows_skipped={} write_failed={} warnings={}",
            self.cnt_sheets,
            self.cnt_filled,
            self.cnt_numeric,
            self.cnt_text,
            self.cnt_unmatched,
            self.cnt_rows_skipped,
            self.cnt_write_failed,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MERGE]"))
    }
}

/// Mutable accumulator for merge statistics; observes events directly.
#[derive(Debug, Default, Clone)]
pub struct ReportMergeBuilder {
    /// See [`ReportMerge::cnt_sheets`].
    pub cnt_sheets: u64,
    /// See [`ReportMerge::cnt_rows_skipped`].
    pub cnt_rows_skipped: u64,
    /// See [`ReportMerge::cnt_filled`].
    pub cnt_filled: u64,
    /// See [`ReportMerge::cnt_numeric`].
    pub cnt_numeric: u64,
    /// See [`ReportMerge::cnt_text`].
    pub cnt_text: u64,
    /// See [`ReportMerge::cnt_unmatched`].
    pub cnt_unmatched: u64,
    /// See [`ReportMerge::cnt_write_failed`].
    pub cnt_write_failed: u64,
    /// See [`ReportMerge::warnings`].
    pub warnings: Vec<String>,
}

impl ReportMergeBuilder {
    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Fold another builder into this one, appending its warnings after ours.
    pub fn extend(&mut self, other: ReportMergeBuilder) {
        self.cnt_sheets += other.cnt_sheets;
        self.cnt_rows_skipped += other.cnt_rows_skipped;
        self.cnt_filled += other.cnt_filled;
        self.cnt_numeric += other.cnt_numeric;
        self.cnt_text += other.cnt_text;
        self.cnt_unmatched += other.cnt_unmatched;
        self.cnt_write_failed += other.cnt_write_failed;
        self.warnings.extend(other.warnings);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportMerge {
        ReportMerge {
            cnt_sheets: self.cnt_sheets,
            cnt_rows_skipped: self.cnt_rows_skipped,
            cnt_filled: self.cnt_filled,
            cnt_numeric: self.cnt_numeric,
            cnt_text: self.cnt_text,
            cnt_unmatched: self.cnt_unmatched,
            cnt_write_failed: self.cnt_write_failed,
            warnings: self.warnings,
            path_output: None,
        }
    }
}

impl ScoreObserver for ReportMergeBuilder {
    fn observe(&mut self, event: &EnumScoreEvent) {
        match event {
            EnumScoreEvent::SheetLoaded { .. } => self.cnt_sheets += 1,
            EnumScoreEvent::RowSkippedShort { .. }
            | EnumScoreEvent::RowSkippedMissingStudent { .. } => self.cnt_rows_skipped += 1,
            EnumScoreEvent::ScoreFilled { value, .. } => {
                self.cnt_filled += 1;
                match value {
                    EnumCellWriteValue::Integer(_) => self.cnt_numeric += 1,
                    EnumCellWriteValue::Text(_) => self.cnt_text += 1,
                }
            }
            EnumScoreEvent::ScoreUnmatched { .. } => self.cnt_unmatched += 1,
            EnumScoreEvent::CellWriteFailed { .. } => self.cnt_write_failed += 1,
            EnumScoreEvent::DuplicateStudentRow { .. }
            | EnumScoreEvent::SubjectMissing { .. }
            | EnumScoreEvent::ScoreBlank { .. }
            | EnumScoreEvent::ScoreLoaded { .. } => {}
        }
        if event.level() == Level::Warn {
            self.add_warning(event.to_string());
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_merge_to_dict_and_format() {
        let report = ReportMerge {
            cnt_sheets: 3,
            cnt_rows_skipped: 1,
            cnt_filled: 4,
            cnt_numeric: 3,
            cnt_text: 1,
            cnt_unmatched: 2,
            cnt_write_failed: 0,
            warnings: vec!["w".to_string()],
            path_output: None,
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_filled"], 4);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[MERGE]");
        assert_eq!(
            txt,
            "[MERGE] sheets=3 filled=4 numeric=3 text=1 unmatched=2 rows_skipped=1 write_failed=0 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn builder_counts_events_and_collects_warnings() {
        let mut builder = ReportMergeBuilder::default();
        let key = SpecStudentSubjectKey::new("1班", "张三", "语言课1");

        builder.observe(&EnumScoreEvent::RowSkippedShort {
            locator: "a.xlsx".to_string(),
            row: 5,
            n_cells: 2,
        });
        builder.observe(&EnumScoreEvent::ScoreFilled {
            key: key.clone(),
            source_index: 0,
            source_locator: "b.xlsx".to_string(),
            row: 2,
            column: 4,
            value: EnumCellWriteValue::Integer(90),
        });
        builder.observe(&EnumScoreEvent::ScoreFilled {
            key: key.clone(),
            source_index: 1,
            source_locator: "c.xlsx".to_string(),
            row: 2,
            column: 5,
            value: EnumCellWriteValue::Text("缺考".to_string()),
        });
        builder.observe(&EnumScoreEvent::ScoreUnmatched {
            key,
            row: 3,
            column: 4,
        });

        let report = builder.build();
        assert_eq!(report.cnt_rows_skipped, 1);
        assert_eq!(report.cnt_filled, 2);
        assert_eq!(report.cnt_numeric, 1);
        assert_eq!(report.cnt_text, 1);
        assert_eq!(report.cnt_unmatched, 1);
        assert_eq!(report.warning_count(), 1);
        assert!(report.warnings[0].contains("row=5"));
    }

    #[test]
    fn builder_extend_keeps_order() {
        let mut first = ReportMergeBuilder::default();
        first.add_warning("first".to_string());
        first.cnt_sheets = 1;
        let mut second = ReportMergeBuilder::default();
        second.add_warning("second".to_string());
        second.cnt_sheets = 2;

        first.extend(second);
        assert_eq!(first.cnt_sheets, 3);
        assert_eq!(first.warnings, vec!["first", "second"]);
    }

    #[test]
    fn event_display_names_cell_axis() {
        let event = EnumScoreEvent::SubjectMissing {
            locator: "a.xlsx".to_string(),
            row: 3,
            column: 4,
            class_name: "1班".to_string(),
            student_name: "张三".to_string(),
        };
        assert_eq!(event.level(), Level::Warn);
        assert!(event.to_string().contains("cell=D3"));
    }

    #[test]
    fn pair_observer_fans_out() {
        let mut left = ReportMergeBuilder::default();
        let mut right = ReportMergeBuilder::default();
        {
            let mut pair = (&mut left, &mut right);
            pair.observe(&EnumScoreEvent::SheetLoaded {
                locator: "a.xlsx".to_string(),
                n_headers: 5,
                n_students: 1,
                n_keys: 2,
            });
        }
        assert_eq!(left.cnt_sheets, 1);
        assert_eq!(right.cnt_sheets, 1);
    }
}
