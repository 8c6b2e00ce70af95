//! Discovery option models and top-level error types.

use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumDiscoverSymlinkStrategy {
    /// Follow links to files and directories (loops are detected and skipped).
    #[default]
    Follow,
    /// Ignore symlink entries found while walking a directory.
    Skip,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumDiscoverPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Depth filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumDiscoverDepthLimitMode {
    /// Include files with depth `<= depth_limit`.
    #[default]
    AtMost,
    /// Include files with depth exactly equal to `depth_limit`.
    Exact,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `discover_sources`.
///
/// Patterns apply to basenames of entries found while walking a directory;
/// files named explicitly are always taken.
#[derive(Debug, Clone)]
pub struct SpecDiscoverOptions {
    /// Include patterns applied to file basename.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Include patterns applied to directory basename.
    pub patterns_include_dirs: Option<Vec<String>>,
    /// Exclude patterns applied to directory basename.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumDiscoverPatternMode,
    /// Symlink handling behavior.
    pub rule_symlink: EnumDiscoverSymlinkStrategy,
    /// Optional maximum/target depth (files directly under a root have depth 1).
    pub depth_limit: Option<usize>,
    /// Depth evaluation mode.
    pub rule_depth_limit: EnumDiscoverDepthLimitMode,
    /// Skip Office lock files (`~$name.xlsx`).
    pub if_skip_lock_files: bool,
}

impl Default for SpecDiscoverOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: None,
            patterns_exclude_files: None,
            patterns_include_dirs: None,
            patterns_exclude_dirs: None,
            rule_pattern: EnumDiscoverPatternMode::Glob,
            rule_symlink: EnumDiscoverSymlinkStrategy::Follow,
            depth_limit: None,
            rule_depth_limit: EnumDiscoverDepthLimitMode::AtMost,
            if_skip_lock_files: true,
        }
    }
}

/// "Top-level call failed" errors (input validation / missing roots).
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// Invalid depth combination or value.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// Invalid include/exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// Input path does not exist or cannot be inspected.
    #[error("Source path not found: {}", path.display())]
    SourceNotFound {
        /// Offending input path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
