//! Source workbook discovery over files and directory trees.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conf::C_LOG_TARGET;
use crate::report::{ReportDiscover, ReportDiscoverBuilder};
use crate::spec::{DiscoverError, EnumDiscoverDepthLimitMode, EnumDiscoverSymlinkStrategy, SpecDiscoverOptions};
use crate::util::{SpecDiscoverPatterns, is_depth_within_limit, is_lock_file_name};

#[derive(Debug)]
struct SpecDiscoverContext {
    spec_discover_options: SpecDiscoverOptions,
    spec_discover_pats: SpecDiscoverPatterns,
    builder_discover_report: ReportDiscoverBuilder,
    set_visited_dirs: HashSet<PathBuf>,
    set_seen_files: HashSet<PathBuf>,
}

impl SpecDiscoverContext {
    fn accept_file(&mut self, path_file: PathBuf) {
        let path_key = fs::canonicalize(&path_file).unwrap_or_else(|_| path_file.clone());
        if !self.set_seen_files.insert(path_key) {
            self.builder_discover_report.add_skipped();
            self.builder_discover_report.add_warning(format!(
                "Duplicate source skipped: {}",
                path_file.display()
            ));
            return;
        }
        log::debug!(target: C_LOG_TARGET, "Discovered source: {}", path_file.display());
        self.builder_discover_report.add_file(path_file);
    }
}

/// Expand `paths` into an ordered list of source files.
///
/// Files named explicitly are taken as given, bypassing patterns. Directories
/// are walked recursively with entries visited in lexical name order, so
/// subdirectories interleave with files where their names sort. The returned
/// order is the precedence order for merging.
///
/// Returns [`DiscoverError`] for invalid options or a top-level path that
/// cannot be inspected. Problems below a root are recorded as warnings.
pub fn discover_sources<P>(
    paths: &[P],
    spec_discover_options: SpecDiscoverOptions,
) -> Result<ReportDiscover, DiscoverError>
where
    P: AsRef<Path>,
{
    if spec_discover_options.depth_limit == Some(0) {
        return Err(DiscoverError::InvalidDepthLimit(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }
    if spec_discover_options.depth_limit.is_none()
        && spec_discover_options.rule_depth_limit == EnumDiscoverDepthLimitMode::Exact
    {
        return Err(DiscoverError::InvalidDepthLimit(
            "`depth_limit` is required when depth_mode='exact'.".to_string(),
        ));
    }

    let spec_discover_pats = SpecDiscoverPatterns::from_raw(
        spec_discover_options.patterns_include_files.as_deref(),
        spec_discover_options.patterns_exclude_files.as_deref(),
        spec_discover_options.patterns_include_dirs.as_deref(),
        spec_discover_options.patterns_exclude_dirs.as_deref(),
        spec_discover_options.rule_pattern,
    )?;

    let mut spec_ctx = SpecDiscoverContext {
        spec_discover_options,
        spec_discover_pats,
        builder_discover_report: ReportDiscoverBuilder::default(),
        set_visited_dirs: HashSet::new(),
        set_seen_files: HashSet::new(),
    };

    for path in paths {
        let path_input = path.as_ref();
        let meta_input = fs::metadata(path_input).map_err(|e| DiscoverError::SourceNotFound {
            path: path_input.to_path_buf(),
            source: e,
        })?;

        if meta_input.is_file() {
            spec_ctx.builder_discover_report.add_scanned();
            spec_ctx.accept_file(path_input.to_path_buf());
        } else if meta_input.is_dir() {
            if let Ok(path_canonical) = fs::canonicalize(path_input) {
                spec_ctx.set_visited_dirs.insert(path_canonical);
            }
            walk_directory(path_input, 1, &mut spec_ctx);
        } else {
            spec_ctx.builder_discover_report.add_skipped();
            spec_ctx.builder_discover_report.add_warning(format!(
                "Unsupported source type skipped: {}",
                path_input.display()
            ));
        }
    }

    let report = spec_ctx.builder_discover_report.build();
    log::info!(target: C_LOG_TARGET, "{report}");
    Ok(report)
}

/// Visit entries of `path_dir`; `n_depth` is the depth of its direct children.
fn walk_directory(path_dir: &Path, n_depth: usize, spec_ctx: &mut SpecDiscoverContext) {
    let iter_entries = match fs::read_dir(path_dir) {
        Ok(v) => v,
        Err(e) => {
            spec_ctx.builder_discover_report.add_warning(format!(
                "Failed to read directory {}: {e}",
                path_dir.display()
            ));
            return;
        }
    };

    let mut l_entries = Vec::new();
    for res_entry in iter_entries {
        match res_entry {
            Ok(entry) => l_entries.push(entry),
            Err(e) => spec_ctx.builder_discover_report.add_warning(format!(
                "Failed to read entry under {}: {e}",
                path_dir.display()
            )),
        }
    }
    l_entries.sort_by_key(|entry| entry.file_name());

    let depth_limit = spec_ctx.spec_discover_options.depth_limit;
    let enum_rule_depth_limit = spec_ctx.spec_discover_options.rule_depth_limit;

    for entry in l_entries {
        let path_entry = entry.path();
        let name_entry = entry.file_name().to_string_lossy().into_owned();

        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_ctx.builder_discover_report.add_warning(format!(
                    "Failed to inspect {}: {e}",
                    path_entry.display()
                ));
                continue;
            }
        };

        let b_is_symlink = cfg_file_type.is_symlink();
        if b_is_symlink
            && spec_ctx.spec_discover_options.rule_symlink == EnumDiscoverSymlinkStrategy::Skip
        {
            spec_ctx.builder_discover_report.add_skipped();
            continue;
        }

        let meta_entry = if b_is_symlink {
            match fs::metadata(&path_entry) {
                Ok(v) => v,
                Err(_) => {
                    spec_ctx.builder_discover_report.add_skipped();
                    spec_ctx.builder_discover_report.add_warning(format!(
                        "Broken symlink: {}",
                        path_entry.display()
                    ));
                    continue;
                }
            }
        } else {
            match entry.metadata() {
                Ok(v) => v,
                Err(e) => {
                    spec_ctx.builder_discover_report.add_warning(format!(
                        "Failed to inspect {}: {e}",
                        path_entry.display()
                    ));
                    continue;
                }
            }
        };

        if meta_entry.is_dir() {
            if spec_ctx.spec_discover_pats.should_exclude_dir(&name_entry) {
                continue;
            }
            if let Some(n_limit) = depth_limit
                && n_depth + 1 > n_limit
            {
                continue;
            }
            let path_canonical =
                fs::canonicalize(&path_entry).unwrap_or_else(|_| path_entry.clone());
            if !spec_ctx.set_visited_dirs.insert(path_canonical) {
                spec_ctx.builder_discover_report.add_warning(format!(
                    "Directory loop skipped: {}",
                    path_entry.display()
                ));
                continue;
            }
            walk_directory(&path_entry, n_depth + 1, spec_ctx);
        } else if meta_entry.is_file() {
            spec_ctx.builder_discover_report.add_scanned();
            if spec_ctx.spec_discover_options.if_skip_lock_files && is_lock_file_name(&name_entry)
            {
                spec_ctx.builder_discover_report.add_skipped();
                continue;
            }
            if spec_ctx.spec_discover_pats.should_exclude_file(&name_entry)
                || !is_depth_within_limit(n_depth, depth_limit, enum_rule_depth_limit)
            {
                spec_ctx.builder_discover_report.add_skipped();
                continue;
            }
            spec_ctx.accept_file(path_entry);
        } else {
            spec_ctx.builder_discover_report.add_skipped();
            spec_ctx.builder_discover_report.add_warning(format!(
                "Special file skipped: {}",
                path_entry.display()
            ));
        }
    }
}
