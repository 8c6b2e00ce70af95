//! Discovery report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::conf::C_LOG_TARGET;

/// Ordered source list plus counters and diagnostics for one discovery run.
#[derive(Debug, Default, Clone)]
pub struct ReportDiscover {
    /// Discovered files in precedence order.
    pub files: Vec<PathBuf>,
    /// Total file entries inspected.
    pub cnt_scanned: u64,
    /// Number of files accepted into `files`.
    pub cnt_matched: u64,
    /// Entries skipped by pattern, lock-file, symlink or duplicate rules.
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
}

impl ReportDiscover {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} matched={} skipped={} warnings={}",
            self.cnt_scanned,
            self.cnt_matched,
            self.cnt_skipped,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportDiscover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[DISCOVER]"))
    }
}

/// Mutable accumulator for discovery results.
#[derive(Debug, Default, Clone)]
pub struct ReportDiscoverBuilder {
    /// See [`ReportDiscover::files`].
    pub files: Vec<PathBuf>,
    /// See [`ReportDiscover::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportDiscover::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportDiscover::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportDiscover::warnings`].
    pub warnings: Vec<String>,
}

impl ReportDiscoverBuilder {
    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Accept one file.
    pub fn add_file(&mut self, path: PathBuf) {
        self.cnt_matched += 1;
        self.files.push(path);
    }

    /// Add warning message; also forwarded to the `log` facade.
    pub fn add_warning(&mut self, warning: String) {
        log::warn!(target: C_LOG_TARGET, "{warning}");
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportDiscover {
        ReportDiscover {
            files: self.files,
            cnt_scanned: self.cnt_scanned,
            cnt_matched: self.cnt_matched,
            cnt_skipped: self.cnt_skipped,
            warnings: self.warnings,
        }
    }
}
