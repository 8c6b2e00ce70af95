use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{DiscoverError, EnumDiscoverDepthLimitMode, EnumDiscoverPatternMode};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeDiscoverPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypeDiscoverPatternSeq {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SpecDiscoverPatterns {
    pub(crate) patterns_include_files: Option<TypeDiscoverPatternSeq>,
    pub(crate) patterns_exclude_files: Option<TypeDiscoverPatternSeq>,
    pub(crate) patterns_include_dirs: Option<TypeDiscoverPatternSeq>,
    pub(crate) patterns_exclude_dirs: Option<TypeDiscoverPatternSeq>,
}

impl SpecDiscoverPatterns {
    pub(crate) fn from_raw(
        patterns_include_files: Option<&[String]>,
        patterns_exclude_files: Option<&[String]>,
        patterns_include_dirs: Option<&[String]>,
        patterns_exclude_dirs: Option<&[String]>,
        rule_pattern: EnumDiscoverPatternMode,
    ) -> Result<Self, DiscoverError> {
        Ok(Self {
            patterns_include_files: _compile(patterns_include_files, rule_pattern)?,
            patterns_exclude_files: _compile(patterns_exclude_files, rule_pattern)?,
            patterns_include_dirs: _compile(patterns_include_dirs, rule_pattern)?,
            patterns_exclude_dirs: _compile(patterns_exclude_dirs, rule_pattern)?,
        })
    }

    pub(crate) fn should_exclude_file(&self, name: &str) -> bool {
        should_exclude_by_patterns(
            name,
            self.patterns_include_files.as_ref(),
            self.patterns_exclude_files.as_ref(),
        )
    }

    pub(crate) fn should_exclude_dir(&self, name: &str) -> bool {
        should_exclude_by_patterns(
            name,
            self.patterns_include_dirs.as_ref(),
            self.patterns_exclude_dirs.as_ref(),
        )
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumDiscoverPatternMode,
) -> Result<Option<TypeDiscoverPatternSeq>, DiscoverError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumDiscoverPatternMode::Literal => {
            Ok(Some(TypeDiscoverPatternSeq::Literal(patterns.to_vec())))
        }
        EnumDiscoverPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        DiscoverError::InvalidPattern(format!(
                            "Invalid pattern in include/exclude: {e}"
                        ))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeDiscoverPatternSeq::Glob(l_glob)))
        }
        EnumDiscoverPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    DiscoverError::InvalidPattern(format!(
                        "Invalid pattern in include/exclude: {e}"
                    ))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeDiscoverPatternSeq::Regex(l_regex)))
        }
    }
}

pub(crate) fn should_exclude_by_patterns(
    value: &str,
    patterns_include: Option<&TypeDiscoverPatternSeq>,
    patterns_exclude: Option<&TypeDiscoverPatternSeq>,
) -> bool {
    let b_included = patterns_include.is_none_or(|p| p.is_match(value));
    let b_excluded = patterns_exclude.is_some_and(|p| p.is_match(value));
    !b_included || b_excluded
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Office writes `~$name.xlsx` next to a workbook that is open for editing.
pub(crate) fn is_lock_file_name(name: &str) -> bool {
    name.starts_with("~$")
}

pub(crate) fn is_depth_within_limit(
    depth_value: usize,
    depth_limit: Option<usize>,
    rule_depth_limit: EnumDiscoverDepthLimitMode,
) -> bool {
    match depth_limit {
        None => true,
        Some(limit) => match rule_depth_limit {
            EnumDiscoverDepthLimitMode::AtMost => depth_value <= limit,
            EnumDiscoverDepthLimitMode::Exact => depth_value == limit,
        },
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
