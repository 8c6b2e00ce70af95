//! `scorekit_merge` v1:
//! Score sheet merge kernel.
//!
//! Layout:
//! - `conf`    : fixed sheet layout constants
//! - `spec`    : keys, cells, tables, writes and errors
//! - `util`    : column-axis codec and score coercion helpers
//! - `parser`  : raw rows -> score table
//! - `merge`   : first-match-wins merge engine
//! - `gateway` : spreadsheet gateway seam and load/apply helpers
//! - `report`  : per-cell events, observers and the merge report
pub mod conf;
pub mod gateway;
pub mod merge;
pub mod parser;
pub mod report;
pub mod spec;
pub mod util;

pub use conf::{
    C_LOG_TARGET, N_COL_CLASS_NAME, N_COL_STUDENT_NAME, N_COLS_HEADER_MIN, N_COLS_MAX,
    N_COLS_STUDENT_INFO, N_SHEET_INDEX_DEFAULT,
};
pub use gateway::{SpreadsheetGateway, apply_cell_writes, load_score_table};
pub use merge::merge;
pub use parser::parse_sheet;
pub use report::{
    EnumScoreEvent, LogObserver, NoopObserver, ReportMerge, ReportMergeBuilder, ScoreObserver,
};
pub use spec::{
    EnumCellWriteValue, EnumRoundingRule, ScoreError, SpecCellWrite, SpecMergeOutcome,
    SpecScoreCell, SpecScoreTable, SpecStudentSubjectKey,
};
pub use util::{
    coerce_score_value, column_name_to_number, column_number_to_name, derive_cell_axis,
    round_score,
};
