//! Calamine-backed workbook with buffered cell writes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{Reader, Sheets, open_workbook_auto_from_rs};
use scorekit_merge::{
    C_LOG_TARGET, EnumCellWriteValue, N_COLS_MAX, ScoreError, SpreadsheetGateway,
    derive_cell_axis,
};
use zip::ZipArchive;

use crate::patcher::{TypeCellPatches, patch_package, read_sheet_parts};
use crate::spec::XlsxError;
use crate::util::derive_rows_from_range;

/// One opened XLSX workbook.
///
/// Reads go through `calamine`; writes are buffered per sheet and only land
/// on disk through [`XlsxWorkbook::save_as`], which patches the original
/// package so formatting and untouched parts are preserved.
pub struct XlsxWorkbook {
    path_file: PathBuf,
    v_bytes: Vec<u8>,
    workbook: Sheets<Cursor<Vec<u8>>>,
    l_sheet_names: Vec<String>,
    dict_writes: BTreeMap<String, TypeCellPatches>,
}

impl XlsxWorkbook {
    /// Read `path` fully into memory and decode its sheet list.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XlsxError> {
        let path_file = path.as_ref().to_path_buf();
        let v_bytes = fs::read(&path_file).map_err(|e| XlsxError::Io {
            path: path_file.clone(),
            source: e,
        })?;
        let workbook = open_workbook_auto_from_rs(Cursor::new(v_bytes.clone())).map_err(|e| {
            XlsxError::Workbook {
                path: path_file.clone(),
                message: e.to_string(),
            }
        })?;
        let l_sheet_names = workbook.sheet_names();
        log::debug!(
            target: C_LOG_TARGET,
            "Opened workbook {} with sheets {:?}",
            path_file.display(),
            l_sheet_names
        );

        Ok(Self {
            path_file,
            v_bytes,
            workbook,
            l_sheet_names,
            dict_writes: BTreeMap::new(),
        })
    }

    /// Path the workbook was opened from.
    pub fn path(&self) -> &Path {
        &self.path_file
    }

    /// Sheet names in tab order.
    pub fn sheet_names(&self) -> &[String] {
        &self.l_sheet_names
    }

    /// Number of buffered cell writes across all sheets.
    pub fn pending_write_count(&self) -> usize {
        self.dict_writes.values().map(BTreeMap::len).sum()
    }

    /// Write the workbook, with buffered cell writes applied, to `path`.
    ///
    /// Without buffered writes the original bytes are copied unchanged.
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> Result<(), XlsxError> {
        let path_out = path.as_ref();
        let v_out = if self.dict_writes.is_empty() {
            self.v_bytes.clone()
        } else {
            let mut archive = ZipArchive::new(Cursor::new(self.v_bytes.as_slice()))?;
            let dict_parts: HashMap<String, String> =
                read_sheet_parts(&mut archive)?.into_iter().collect();

            let mut dict_patches = HashMap::new();
            for (name_sheet, dict_cells) in &self.dict_writes {
                let name_part = dict_parts
                    .get(name_sheet)
                    .ok_or_else(|| XlsxError::SheetPartNotFound(name_sheet.clone()))?;
                dict_patches.insert(name_part.clone(), dict_cells.clone());
            }
            patch_package(&self.v_bytes, &dict_patches)?
        };

        fs::write(path_out, v_out).map_err(|e| XlsxError::Io {
            path: path_out.to_path_buf(),
            source: e,
        })?;
        log::info!(
            target: C_LOG_TARGET,
            "Saved workbook {} ({} cells written)",
            path_out.display(),
            self.pending_write_count()
        );
        Ok(())
    }

    fn buffer_write(
        &mut self,
        sheet: &str,
        row: u32,
        column: u32,
        value: EnumCellWriteValue,
    ) -> Result<(), ScoreError> {
        let c_axis = derive_cell_axis(row, column).map_err(|e| ScoreError::CellWrite {
            locator: self.locator(),
            cell: format!("R{row}C{column}"),
            message: e.to_string(),
        })?;
        if column > N_COLS_MAX {
            return Err(ScoreError::CellWrite {
                locator: self.locator(),
                cell: c_axis,
                message: format!("column exceeds {N_COLS_MAX}"),
            });
        }
        if !self.l_sheet_names.iter().any(|name| name == sheet) {
            return Err(ScoreError::CellWrite {
                locator: self.locator(),
                cell: c_axis,
                message: XlsxError::SheetNotFound(sheet.to_string()).to_string(),
            });
        }

        self.dict_writes
            .entry(sheet.to_string())
            .or_default()
            .insert((row, column), value);
        Ok(())
    }
}

impl SpreadsheetGateway for XlsxWorkbook {
    fn locator(&self) -> String {
        self.path().display().to_string()
    }

    fn resolve_default_sheet(&self, sheet_index: usize) -> Result<String, ScoreError> {
        self.l_sheet_names
            .get(sheet_index)
            .cloned()
            .ok_or_else(|| ScoreError::SheetRead {
                locator: self.locator(),
                message: format!(
                    "no sheet at index {sheet_index} (workbook has {})",
                    self.l_sheet_names.len()
                ),
            })
    }

    fn get_rows(&mut self, sheet: &str) -> Result<Vec<Vec<String>>, ScoreError> {
        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|e| ScoreError::SheetRead {
                locator: self.locator(),
                message: e.to_string(),
            })?;
        Ok(derive_rows_from_range(&range))
    }

    fn set_cell_number(
        &mut self,
        sheet: &str,
        row: u32,
        column: u32,
        value: i64,
    ) -> Result<(), ScoreError> {
        self.buffer_write(sheet, row, column, EnumCellWriteValue::Integer(value))
    }

    fn set_cell_text(
        &mut self,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<(), ScoreError> {
        self.buffer_write(sheet, row, column, EnumCellWriteValue::Text(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use rust_xlsxwriter::{Format, Workbook};

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
            let path = std::env::temp_dir().join(format!("scorekit_xlsx_test_{n}_{n_seq}"));
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

    /// Two-sheet workbook whose second sheet holds a styled score table.
    fn write_fixture(path: &Path) {
        let mut workbook = Workbook::new();
        let fmt_score = Format::new().set_bold();

        let sheet_info = workbook.add_worksheet();
        sheet_info.set_name("说明").expect("name");
        sheet_info.write_string(0, 0, "成绩汇总").expect("write");

        let sheet_score = workbook.add_worksheet();
        sheet_score.set_name("成绩").expect("name");
        for (n_col, c_header) in ["序号", "姓名", "语言班", "语言课1", "专业课1"]
            .iter()
            .enumerate()
        {
            sheet_score
                .write_string(0, n_col as u16, *c_header)
                .expect("write");
        }
        sheet_score.write_number(1, 0, 1.0).expect("write");
        sheet_score.write_string(1, 1, "张三").expect("write");
        sheet_score.write_string(1, 2, "1班").expect("write");
        sheet_score.write_blank(1, 3, &fmt_score).expect("write");
        sheet_score.write_number(1, 4, 87.5).expect("write");

        workbook.save(path).expect("save fixture");
    }

    fn read_part_text(path: &Path, name_part: &str) -> String {
        let v_bytes = std::fs::read(path).expect("read");
        let mut archive = ZipArchive::new(Cursor::new(v_bytes)).expect("zip");
        let v_part = crate::patcher::read_part(&mut archive, name_part).expect("part");
        String::from_utf8(v_part).expect("utf8")
    }

    #[test]
    fn open_and_read_rows() {
        let td = TestDir::new();
        let path = td.path().join("成绩.xlsx");
        write_fixture(&path);

        let mut workbook = XlsxWorkbook::open(&path).expect("open");
        assert_eq!(workbook.path(), path.as_path());
        assert_eq!(workbook.locator(), path.display().to_string());
        assert_eq!(workbook.sheet_names(), ["说明", "成绩"]);
        let sheet = workbook.resolve_default_sheet(1).expect("sheet");
        assert_eq!(sheet, "成绩");

        let rows = workbook.get_rows(&sheet).expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ["序号", "姓名", "语言班", "语言课1", "专业课1"]);
        assert_eq!(rows[1], ["1", "张三", "1班", "", "87.5"]);

        assert!(matches!(
            workbook.resolve_default_sheet(2),
            Err(ScoreError::SheetRead { .. })
        ));
    }

    #[test]
    fn open_rejects_missing_and_invalid_files() {
        let td = TestDir::new();
        let err = XlsxWorkbook::open(td.path().join("missing.xlsx")).err().expect("missing");
        assert!(matches!(err, XlsxError::Io { .. }));

        let path_bad = td.path().join("bad.xlsx");
        std::fs::write(&path_bad, "not a workbook").expect("write");
        let err = XlsxWorkbook::open(&path_bad).err().expect("invalid");
        assert!(matches!(err, XlsxError::Workbook { .. }));
    }

    #[test]
    fn save_as_patches_cells_and_keeps_style() {
        let td = TestDir::new();
        let path = td.path().join("成绩.xlsx");
        let path_out = td.path().join("out.xlsx");
        write_fixture(&path);

        let mut workbook = XlsxWorkbook::open(&path).expect("open");
        workbook.set_cell_number("成绩", 2, 4, 90).expect("number");
        workbook.set_cell_text("成绩", 2, 5, "缺考").expect("text");
        workbook.set_cell_number("成绩", 4, 2, 7).expect("new row");
        assert_eq!(workbook.pending_write_count(), 3);
        workbook.save_as(&path_out).expect("save");

        let xml_sheet = read_part_text(&path_out, "xl/worksheets/sheet2.xml");
        assert!(xml_sheet.contains(r#"<c r="D2" s="1"><v>90</v></c>"#), "{xml_sheet}");
        assert_eq!(
            read_part_text(&path_out, "xl/worksheets/sheet1.xml"),
            read_part_text(&path, "xl/worksheets/sheet1.xml")
        );
        assert_eq!(
            read_part_text(&path_out, "xl/styles.xml"),
            read_part_text(&path, "xl/styles.xml")
        );

        let mut reread = XlsxWorkbook::open(&path_out).expect("reopen");
        let rows = reread.get_rows("成绩").expect("rows");
        assert_eq!(rows[1], ["1", "张三", "1班", "90", "缺考"]);
        assert_eq!(rows[3], ["", "7"]);
    }

    #[test]
    fn save_as_without_writes_copies_bytes() {
        let td = TestDir::new();
        let path = td.path().join("成绩.xlsx");
        let path_out = td.path().join("copy.xlsx");
        write_fixture(&path);

        let workbook = XlsxWorkbook::open(&path).expect("open");
        workbook.save_as(&path_out).expect("save");
        assert_eq!(
            std::fs::read(&path).expect("read"),
            std::fs::read(&path_out).expect("read")
        );
    }

    #[test]
    fn writes_to_unknown_sheet_or_column_fail() {
        let td = TestDir::new();
        let path = td.path().join("成绩.xlsx");
        write_fixture(&path);

        let mut workbook = XlsxWorkbook::open(&path).expect("open");
        let err = workbook.set_cell_number("缺失", 2, 4, 1).expect_err("sheet");
        assert!(matches!(err, ScoreError::CellWrite { ref cell, .. } if cell == "D2"));
        let err = workbook
            .set_cell_text("成绩", 2, N_COLS_MAX + 1, "x")
            .expect_err("column");
        assert!(matches!(err, ScoreError::CellWrite { .. }));
        let err = workbook.set_cell_number("成绩", 0, 1, 1).expect_err("row");
        assert!(matches!(err, ScoreError::CellWrite { ref cell, .. } if cell == "R0C1"));
        assert_eq!(workbook.pending_write_count(), 0);
    }
}
