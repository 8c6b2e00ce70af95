//! Merge pipeline options and error types.

use std::path::PathBuf;

use scorekit_io_fs::{DiscoverError, SpecDiscoverOptions};
use scorekit_merge::{EnumRoundingRule, N_SHEET_INDEX_DEFAULT, ScoreError};
use thiserror::Error;

use crate::conf::C_OUTPUT_PREFIX_DEFAULT;

////////////////////////////////////////////////////////////////////////////////
// #region MergeOptions

/// Input options for [`crate::pipeline::merge_score_files`].
#[derive(Debug, Clone)]
pub struct SpecMergeOptions {
    /// Leading rows skipped before the header row, in every workbook.
    pub skip_rows: usize,
    /// 0-based index of the score sheet inside each workbook.
    pub sheet_index: usize,
    /// Rounding applied to numeric scores before writing.
    pub rule_rounding: EnumRoundingRule,
    /// File name prefix of the default output path.
    pub output_prefix: String,
    /// Explicit output path; overrides `output_prefix` when set.
    pub path_output: Option<PathBuf>,
    /// Upper bound of workers loading source workbooks; `None` uses the CPU
    /// count capped at [`crate::conf::N_NUM_WORKERS_DEFAULT`].
    pub num_workers_max: Option<usize>,
    /// Source discovery options.
    pub discover: SpecDiscoverOptions,
}

impl Default for SpecMergeOptions {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            sheet_index: N_SHEET_INDEX_DEFAULT,
            rule_rounding: EnumRoundingRule::HalfAwayFromZero,
            output_prefix: C_OUTPUT_PREFIX_DEFAULT.to_string(),
            path_output: None,
            num_workers_max: None,
            discover: SpecDiscoverOptions {
                patterns_include_files: Some(vec!["*.xlsx".to_string()]),
                ..SpecDiscoverOptions::default()
            },
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Workbook open/read/save failures.
#[derive(Debug, Error)]
pub enum XlsxError {
    /// File could not be read or written.
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Workbook content could not be decoded.
    #[error("Failed to open workbook {}: {message}", path.display())]
    Workbook {
        /// Offending path.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },
    /// ZIP container error.
    #[error("Invalid XLSX package: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// XML part could not be parsed or written.
    #[error("Invalid XLSX part: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Sheet name is not present in the workbook.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
    /// Sheet is listed but its worksheet part cannot be located.
    #[error("Worksheet part not found for sheet: {0}")]
    SheetPartNotFound(String),
    /// Malformed `r` attribute in worksheet XML.
    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),
}

/// "Top-level call failed" errors of the merge pipeline.
#[derive(Debug, Error)]
pub enum MergeScoreError {
    /// Source discovery failed.
    #[error(transparent)]
    Discover(#[from] DiscoverError),
    /// Result workbook could not be parsed, or no sources were given.
    #[error(transparent)]
    Score(#[from] ScoreError),
    /// Workbook open/save failure.
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
    /// One source workbook failed to load; the run is aborted.
    #[error("Failed to load source {}: {source}", path.display())]
    SourceLoad {
        /// Offending source path.
        path: PathBuf,
        /// Underlying load error.
        #[source]
        source: Box<MergeScoreError>,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
