//! `scorekit_io_xlsx` v1:
//! XLSX spreadsheet gateway and merge pipeline.
//!
//! Layout:
//! - `conf`     : constants (output prefix, package part paths)
//! - `spec`     : options and errors
//! - `util`     : cell text, reference and path helpers
//! - `workbook` : calamine-backed reader with buffered writes
//! - `patcher`  : worksheet XML patching and ZIP re-packing
//! - `pipeline` : discover -> load -> merge -> save orchestration
pub mod conf;
mod patcher;
pub mod pipeline;
pub mod spec;
pub mod util;
pub mod workbook;

pub use conf::{C_OUTPUT_PREFIX_DEFAULT, N_NUM_WORKERS_DEFAULT};
pub use pipeline::merge_score_files;
pub use spec::{MergeScoreError, SpecMergeOptions, XlsxError};
pub use util::derive_output_path;
pub use workbook::XlsxWorkbook;
