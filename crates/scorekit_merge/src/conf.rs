//! Fixed sheet layout constants.

/// Number of leading student-info columns (sequence, student, class).
pub const N_COLS_STUDENT_INFO: usize = 3;
/// Minimum header width: student-info columns plus one subject.
pub const N_COLS_HEADER_MIN: usize = N_COLS_STUDENT_INFO + 1;
/// 1-based column holding the student name.
pub const N_COL_STUDENT_NAME: usize = 2;
/// 1-based column holding the class name.
pub const N_COL_CLASS_NAME: usize = 3;
/// Excel worksheet maximum column count (`XFD`).
pub const N_COLS_MAX: u32 = 16_384;
/// Conventional sheet index (0-based) that holds the score table.
pub const N_SHEET_INDEX_DEFAULT: usize = 1;
/// `log` target used by [`crate::report::LogObserver`].
pub const C_LOG_TARGET: &str = "scorekit";
