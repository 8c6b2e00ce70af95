use std::collections::BTreeMap;
use std::path::PathBuf;

use pyo3::exceptions::{PyFileNotFoundError, PyOSError, PyValueError};
use pyo3::prelude::*;
use scorekit_io_fs::{
    DiscoverError, EnumDiscoverDepthLimitMode, EnumDiscoverPatternMode,
    EnumDiscoverSymlinkStrategy,
};
use scorekit_io_xlsx::{MergeScoreError, SpecMergeOptions, merge_score_files};
use scorekit_merge::{
    EnumRoundingRule, ReportMerge, ScoreError, column_name_to_number, column_number_to_name,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "scorekit.merge_score.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "ReportMerge")]
#[derive(Debug, Clone)]
struct PyReportMerge {
    #[pyo3(get)]
    cnt_sheets: u64,
    #[pyo3(get)]
    cnt_rows_skipped: u64,
    #[pyo3(get)]
    cnt_filled: u64,
    #[pyo3(get)]
    cnt_numeric: u64,
    #[pyo3(get)]
    cnt_text: u64,
    #[pyo3(get)]
    cnt_unmatched: u64,
    #[pyo3(get)]
    cnt_write_failed: u64,
    #[pyo3(get)]
    warnings: Vec<String>,
    #[pyo3(get)]
    path_output: Option<String>,
    inner: ReportMerge,
}

impl From<ReportMerge> for PyReportMerge {
    fn from(report_merge: ReportMerge) -> Self {
        Self {
            cnt_sheets: report_merge.cnt_sheets,
            cnt_rows_skipped: report_merge.cnt_rows_skipped,
            cnt_filled: report_merge.cnt_filled,
            cnt_numeric: report_merge.cnt_numeric,
            cnt_text: report_merge.cnt_text,
            cnt_unmatched: report_merge.cnt_unmatched,
            cnt_write_failed: report_merge.cnt_write_failed,
            warnings: report_merge.warnings.clone(),
            path_output: report_merge
                .path_output
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
            inner: report_merge,
        }
    }
}

#[pymethods]
impl PyReportMerge {
    #[getter]
    fn warning_count(&self) -> usize {
        self.inner.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.inner.to_dict()
    }

    #[pyo3(signature = (prefix = "[MERGE]"))]
    fn format(&self, prefix: &str) -> String {
        self.inner.format(prefix)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

fn parse_rule_rounding(value: &str) -> PyResult<EnumRoundingRule> {
    match value {
        "half_away_from_zero" => Ok(EnumRoundingRule::HalfAwayFromZero),
        "half_to_even" => Ok(EnumRoundingRule::HalfToEven),
        _ => Err(PyValueError::new_err(format!(
            "Invalid rounding rule: `{value}`. Expected one of: ['half_away_from_zero', 'half_to_even']"
        ))),
    }
}

fn parse_rule_pattern(value: &str) -> PyResult<EnumDiscoverPatternMode> {
    match value {
        "glob" => Ok(EnumDiscoverPatternMode::Glob),
        "regex" => Ok(EnumDiscoverPatternMode::Regex),
        "literal" => Ok(EnumDiscoverPatternMode::Literal),
        _ => Err(PyValueError::new_err(format!(
            "Invalid pattern strategy: `{value}`. Expected one of: ['glob', 'regex', 'literal']"
        ))),
    }
}

fn parse_rule_symlink(value: &str) -> PyResult<EnumDiscoverSymlinkStrategy> {
    match value {
        "follow" => Ok(EnumDiscoverSymlinkStrategy::Follow),
        "skip" => Ok(EnumDiscoverSymlinkStrategy::Skip),
        _ => Err(PyValueError::new_err(format!(
            "Invalid symlink strategy: `{value}`. Expected one of: ['follow', 'skip']"
        ))),
    }
}

fn parse_rule_depth_limit(value: &str) -> PyResult<EnumDiscoverDepthLimitMode> {
    match value {
        "at_most" => Ok(EnumDiscoverDepthLimitMode::AtMost),
        "exact" => Ok(EnumDiscoverDepthLimitMode::Exact),
        _ => Err(PyValueError::new_err(format!(
            "Invalid depth mode: `{value}`. Expected one of: ['at_most', 'exact']"
        ))),
    }
}

/// True when the failure comes from bad input rather than the filesystem.
fn is_value_error(exception: &MergeScoreError) -> bool {
    match exception {
        MergeScoreError::Discover(DiscoverError::SourceNotFound { .. }) => false,
        MergeScoreError::Discover(_) => true,
        MergeScoreError::Score(ScoreError::SheetRead { .. } | ScoreError::CellWrite { .. }) => {
            false
        }
        MergeScoreError::Score(_) => true,
        MergeScoreError::Xlsx(_) => false,
        MergeScoreError::SourceLoad { source, .. } => is_value_error(source),
    }
}

fn map_merge_score_error(exception: MergeScoreError) -> PyErr {
    let message = exception.to_string();
    match exception {
        MergeScoreError::Discover(DiscoverError::SourceNotFound { .. }) => {
            PyFileNotFoundError::new_err(message)
        }
        ref other if is_value_error(other) => PyValueError::new_err(message),
        _ => PyOSError::new_err(message),
    }
}

#[pyfunction(name = "merge_score")]
#[pyo3(signature = (
    path_result,
    paths_source,
    skip_rows = 0,
    sheet_index = 1,
    rule_rounding = "half_away_from_zero",
    output_prefix = None,
    path_output = None,
    num_workers_max = None,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    rule_symlink = "follow",
    depth_limit = None,
    rule_depth_limit = "at_most",
    if_skip_lock_files = true
))]
#[allow(clippy::too_many_arguments)]
fn merge_score_py(
    py: Python<'_>,
    path_result: String,
    paths_source: Vec<String>,
    skip_rows: usize,
    sheet_index: usize,
    rule_rounding: &str,
    output_prefix: Option<String>,
    path_output: Option<String>,
    num_workers_max: Option<usize>,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    rule_symlink: &str,
    depth_limit: Option<usize>,
    rule_depth_limit: &str,
    if_skip_lock_files: bool,
) -> PyResult<PyReportMerge> {
    let spec_merge_default = SpecMergeOptions::default();
    let mut spec_discover_options = spec_merge_default.discover.clone();
    if patterns_include_files.is_some() {
        spec_discover_options.patterns_include_files = patterns_include_files;
    }
    spec_discover_options.patterns_exclude_files = patterns_exclude_files;
    spec_discover_options.patterns_include_dirs = patterns_include_dirs;
    spec_discover_options.patterns_exclude_dirs = patterns_exclude_dirs;
    spec_discover_options.rule_pattern = parse_rule_pattern(rule_pattern)?;
    spec_discover_options.rule_symlink = parse_rule_symlink(rule_symlink)?;
    spec_discover_options.depth_limit = depth_limit;
    spec_discover_options.rule_depth_limit = parse_rule_depth_limit(rule_depth_limit)?;
    spec_discover_options.if_skip_lock_files = if_skip_lock_files;

    let spec_merge_options = SpecMergeOptions {
        skip_rows,
        sheet_index,
        rule_rounding: parse_rule_rounding(rule_rounding)?,
        output_prefix: output_prefix.unwrap_or(spec_merge_default.output_prefix),
        path_output: path_output.map(PathBuf::from),
        num_workers_max,
        discover: spec_discover_options,
    };

    let report_merge =
        py.allow_threads(|| merge_score_files(path_result, &paths_source, spec_merge_options));
    let report_merge = report_merge.map_err(map_merge_score_error)?;
    Ok(PyReportMerge::from(report_merge))
}

#[pyfunction(name = "column_number_to_name")]
fn column_number_to_name_py(n: u32) -> PyResult<String> {
    column_number_to_name(n).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyfunction(name = "column_name_to_number")]
fn column_name_to_number_py(name: &str) -> PyResult<u32> {
    column_name_to_number(name).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pymodule]
fn _scorekit_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportMerge>()?;
    module.add_function(wrap_pyfunction!(merge_score_py, module)?)?;
    module.add_function(wrap_pyfunction!(column_number_to_name_py, module)?)?;
    module.add_function(wrap_pyfunction!(column_name_to_number_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
