//! Merge pipeline: discover sources, load tables, merge and save.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use scorekit_io_fs::discover_sources;
use scorekit_merge::{
    C_LOG_TARGET, LogObserver, ReportMerge, ReportMergeBuilder, ScoreError, SpecScoreTable,
    apply_cell_writes, load_score_table, merge,
};

use crate::spec::{MergeScoreError, SpecMergeOptions};
use crate::util::{calculate_worker_limit, derive_output_path};
use crate::workbook::XlsxWorkbook;

type TypeSourceLoad = Result<(SpecScoreTable, ReportMergeBuilder), MergeScoreError>;

/// Fill the result workbook at `path_result` from the workbooks under `paths_source`.
///
/// This function performs:
/// 1. Result table load from sheet `sheet_index`.
/// 2. Source discovery (explicit files first-class, directories walked in
///    lexical order); the resulting order is merge precedence.
/// 3. Source table loads, in parallel when more than one worker is allowed.
/// 4. First-match-wins merge and cell writes at the result's own positions.
/// 5. Save to `path_output`, or to `output_prefix` + result file name.
///
/// Any source that fails to load aborts the run. Individual cell write
/// failures are reported in [`ReportMerge`] and do not abort it.
pub fn merge_score_files<P, Q>(
    path_result: P,
    paths_source: &[Q],
    spec_merge_options: SpecMergeOptions,
) -> Result<ReportMerge, MergeScoreError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    if paths_source.is_empty() {
        return Err(ScoreError::NoSources.into());
    }

    let path_result = path_result.as_ref();
    let path_output = spec_merge_options
        .path_output
        .clone()
        .unwrap_or_else(|| derive_output_path(path_result, &spec_merge_options.output_prefix));
    let mut builder_merge_report = ReportMergeBuilder::default();

    let mut workbook_result = XlsxWorkbook::open(path_result)?;
    let (sheet_result, table_result) = load_score_table(
        &mut workbook_result,
        spec_merge_options.sheet_index,
        spec_merge_options.skip_rows,
        &mut (LogObserver, &mut builder_merge_report),
    )?;
    log::info!(
        target: C_LOG_TARGET,
        "Loaded result table {} (sheet={sheet_result:?}, keys={})",
        workbook_result.path().display(),
        table_result.len()
    );

    let report_discover = discover_sources(paths_source, spec_merge_options.discover.clone())?;
    for warning in report_discover.warnings {
        builder_merge_report.add_warning(warning);
    }
    let l_paths_source: Vec<PathBuf> = report_discover
        .files
        .into_iter()
        .filter(|path_source| {
            let b_is_own = is_same_file(path_source, path_result)
                || is_same_file(path_source, &path_output);
            if b_is_own {
                let warning = format!(
                    "Skipped result/output workbook listed as source: {}",
                    path_source.display()
                );
                log::warn!(target: C_LOG_TARGET, "{warning}");
                builder_merge_report.add_warning(warning);
            }
            !b_is_own
        })
        .collect();
    if l_paths_source.is_empty() {
        return Err(ScoreError::NoSources.into());
    }

    let l_tables_source = load_source_tables(
        &l_paths_source,
        &spec_merge_options,
        &mut builder_merge_report,
    )?;

    let outcome = merge(
        table_result,
        &l_tables_source,
        spec_merge_options.rule_rounding,
        &mut (LogObserver, &mut builder_merge_report),
    )?;
    apply_cell_writes(
        &mut workbook_result,
        &sheet_result,
        &outcome.writes,
        &mut (LogObserver, &mut builder_merge_report),
    );
    workbook_result.save_as(&path_output)?;

    let mut report = builder_merge_report.build();
    report.path_output = Some(path_output);
    log::info!(target: C_LOG_TARGET, "{report}");
    Ok(report)
}

/// Load every source table, keeping `l_paths_source` order in the result.
fn load_source_tables(
    l_paths_source: &[PathBuf],
    spec_merge_options: &SpecMergeOptions,
    builder_merge_report: &mut ReportMergeBuilder,
) -> Result<Vec<SpecScoreTable>, MergeScoreError> {
    let n_workers_max = calculate_worker_limit(spec_merge_options.num_workers_max);
    let load_serial = || -> Vec<TypeSourceLoad> {
        l_paths_source
            .iter()
            .map(|path_source| load_source_table(path_source, spec_merge_options))
            .collect()
    };

    let l_results = if n_workers_max <= 1 || l_paths_source.len() <= 1 {
        load_serial()
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => thread_pool.install(|| {
                l_paths_source
                    .par_iter()
                    .map(|path_source| load_source_table(path_source, spec_merge_options))
                    .collect::<Vec<_>>()
            }),
            Err(_) => {
                builder_merge_report.add_warning(format!(
                    "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial load."
                ));
                load_serial()
            }
        }
    };

    let mut l_tables = Vec::with_capacity(l_results.len());
    for res_load in l_results {
        let (table, builder_source) = res_load?;
        builder_merge_report.extend(builder_source);
        l_tables.push(table);
    }
    Ok(l_tables)
}

fn load_source_table(path_source: &Path, spec_merge_options: &SpecMergeOptions) -> TypeSourceLoad {
    let load = || -> TypeSourceLoad {
        let mut builder_source = ReportMergeBuilder::default();
        let mut workbook = XlsxWorkbook::open(path_source)?;
        let (_, table) = load_score_table(
            &mut workbook,
            spec_merge_options.sheet_index,
            spec_merge_options.skip_rows,
            &mut (LogObserver, &mut builder_source),
        )?;
        Ok((table, builder_source))
    };
    load().map_err(|e| MergeScoreError::SourceLoad {
        path: path_source.to_path_buf(),
        source: Box::new(e),
    })
}

fn is_same_file(path_a: &Path, path_b: &Path) -> bool {
    match (fs::canonicalize(path_a), fs::canonicalize(path_b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => path_a == path_b,
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use rust_xlsxwriter::Workbook;
    use scorekit_merge::SpreadsheetGateway;

    use super::*;

    static N_TEST_DIRS: AtomicU64 = AtomicU64::new(0);

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let n_seq = N_TEST_DIRS.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("scorekit_pipeline_test_{n}_{n_seq}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    /// Workbook with a cover sheet and a score sheet holding `rows`.
    fn write_workbook(path: &Path, rows: &[&[&str]]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .set_name("说明")
            .expect("name");
        let sheet = workbook.add_worksheet();
        sheet.set_name("成绩").expect("name");
        for (n_row, row) in rows.iter().enumerate() {
            for (n_col, c_cell) in row.iter().enumerate() {
                let (n_row, n_col) = (n_row as u32, n_col as u16);
                if c_cell.is_empty() {
                    continue;
                }
                match c_cell.parse::<f64>() {
                    Ok(x) => sheet.write_number(n_row, n_col, x).expect("write"),
                    Err(_) => sheet.write_string(n_row, n_col, *c_cell).expect("write"),
                };
            }
        }
        workbook.save(path).expect("save workbook");
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut workbook = XlsxWorkbook::open(path).expect("open");
        workbook.get_rows("成绩").expect("rows")
    }

    const TITLE: &[&str] = &["成绩汇总表"];
    const HEADER: &[&str] = &["序号", "姓名", "语言班", "语言课1", "专业课1"];

    fn options_with_title() -> SpecMergeOptions {
        SpecMergeOptions {
            skip_rows: 1,
            ..SpecMergeOptions::default()
        }
    }

    #[test]
    fn log_target_matches_discovery() {
        assert_eq!(scorekit_io_fs::conf::C_LOG_TARGET, C_LOG_TARGET);
    }

    #[test]
    fn merge_score_files_end_to_end() {
        let td = TestDir::new();
        let path_result = td.path().join("result/成绩.xlsx");
        let dir_sources = td.path().join("sources");
        write_workbook(
            &path_result,
            &[
                TITLE,
                HEADER,
                &["1", "张三", "1班"],
                &["2", "李四", "1班"],
                &["3", "王五", "2班"],
            ],
        );
        write_workbook(
            &dir_sources.join("a.xlsx"),
            &[TITLE, HEADER, &["1", "张三", "1班", "90"]],
        );
        write_workbook(
            &dir_sources.join("b.xlsx"),
            &[
                TITLE,
                &["序号", "姓名", "语言班", "专业课1", "语言课1"],
                &["1", "张三", "1班", "85.5", "70"],
                &["2", "李四", "1班", "缺考", ""],
            ],
        );

        let report = merge_score_files(&path_result, &[&dir_sources], options_with_title())
            .expect("merge");

        let path_output = td.path().join("result/已汇总-成绩.xlsx");
        assert_eq!(report.path_output.as_deref(), Some(path_output.as_path()));
        assert_eq!(report.cnt_sheets, 3);
        assert_eq!(report.cnt_filled, 3);
        assert_eq!(report.cnt_numeric, 2);
        assert_eq!(report.cnt_text, 1);
        assert_eq!(report.cnt_unmatched, 3);
        assert_eq!(report.cnt_write_failed, 0);

        let rows = read_rows(&path_output);
        assert_eq!(rows[0], ["成绩汇总表"]);
        assert_eq!(rows[1], HEADER);
        assert_eq!(rows[2], ["1", "张三", "1班", "90", "86"]);
        assert_eq!(rows[3], ["2", "李四", "1班", "", "缺考"]);
        assert_eq!(rows[4], ["3", "王五", "2班"]);

        let rows_result = read_rows(&path_result);
        assert_eq!(rows_result[2], ["1", "张三", "1班"]);
    }

    #[test]
    fn merge_score_files_explicit_order_and_output_path() {
        let td = TestDir::new();
        let path_result = td.path().join("成绩.xlsx");
        let path_output = td.path().join("out/merged.xlsx");
        std::fs::create_dir_all(td.path().join("out")).expect("create out");
        write_workbook(&path_result, &[HEADER, &["1", "张三", "1班"]]);
        write_workbook(&td.path().join("a.xlsx"), &[HEADER, &["1", "张三", "1班", "60"]]);
        write_workbook(&td.path().join("z.xlsx"), &[HEADER, &["1", "张三", "1班", "99"]]);

        let spec_opts = SpecMergeOptions {
            path_output: Some(path_output.clone()),
            num_workers_max: Some(1),
            ..SpecMergeOptions::default()
        };
        let paths_source = [td.path().join("z.xlsx"), td.path().to_path_buf()];
        let report = merge_score_files(&path_result, &paths_source, spec_opts).expect("merge");

        assert!(report.warnings.iter().any(|w| w.contains("成绩.xlsx")));
        assert!(report.warnings.iter().any(|w| w.contains("Duplicate source")));
        assert_eq!(read_rows(&path_output)[1], ["1", "张三", "1班", "99"]);
    }

    #[test]
    fn merge_score_files_requires_sources() {
        let td = TestDir::new();
        let path_result = td.path().join("成绩.xlsx");
        write_workbook(&path_result, &[HEADER, &["1", "张三", "1班"]]);

        let paths_none: [&Path; 0] = [];
        let err = merge_score_files(&path_result, &paths_none, SpecMergeOptions::default())
            .expect_err("no sources");
        assert!(matches!(err, MergeScoreError::Score(ScoreError::NoSources)));

        let dir_empty = td.path().join("empty");
        std::fs::create_dir_all(&dir_empty).expect("create dir");
        std::fs::write(dir_empty.join("notes.txt"), "").expect("write");
        let err = merge_score_files(&path_result, &[&dir_empty], SpecMergeOptions::default())
            .expect_err("no workbooks");
        assert!(matches!(err, MergeScoreError::Score(ScoreError::NoSources)));
    }

    #[test]
    fn merge_score_files_aborts_on_bad_source() {
        let td = TestDir::new();
        let path_result = td.path().join("成绩.xlsx");
        let dir_sources = td.path().join("sources");
        write_workbook(&path_result, &[HEADER, &["1", "张三", "1班"]]);
        write_workbook(&dir_sources.join("a.xlsx"), &[HEADER, &["1", "张三", "1班", "60"]]);
        write_workbook(
            &dir_sources.join("bad.xlsx"),
            &[&["序号", "姓名", "语言班"], &["1", "张三", "1班"]],
        );

        let err = merge_score_files(&path_result, &[&dir_sources], SpecMergeOptions::default())
            .expect_err("bad source");
        assert!(matches!(
            err,
            MergeScoreError::SourceLoad { ref path, ref source }
                if path.ends_with("bad.xlsx")
                    && matches!(**source, MergeScoreError::Score(ScoreError::InsufficientColumns { .. }))
        ));
        assert!(!td.path().join("已汇总-成绩.xlsx").exists());
    }

    #[test]
    fn merge_score_files_rejects_bad_result_header() {
        let td = TestDir::new();
        let path_result = td.path().join("成绩.xlsx");
        write_workbook(&path_result, &[&["序号", "姓名", "语言班", "", "专业课1"]]);
        write_workbook(&td.path().join("src/a.xlsx"), &[HEADER]);

        let err = merge_score_files(
            &path_result,
            &[td.path().join("src")],
            SpecMergeOptions::default(),
        )
        .expect_err("bad header");
        assert!(matches!(
            err,
            MergeScoreError::Score(ScoreError::MalformedHeader { .. })
        ));
    }
}
