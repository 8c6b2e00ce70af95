//! XLSX constants.

/// File name prefix of the merged workbook written next to the result file.
pub const C_OUTPUT_PREFIX_DEFAULT: &str = "已汇总-";
/// Default upper bound of workers loading source workbooks.
pub const N_NUM_WORKERS_DEFAULT: usize = 8;

/// Workbook part listing sheets in tab order.
pub(crate) const C_PART_WORKBOOK: &str = "xl/workbook.xml";
/// Relationships of the workbook part (sheet `r:id` -> worksheet part).
pub(crate) const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
/// Package folder that relative relationship targets resolve against.
pub(crate) const C_PART_DIR_XL: &str = "xl/";
