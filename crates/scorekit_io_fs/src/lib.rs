//! `scorekit_io_fs` v1:
//! Source workbook discovery.
//!
//! Layout:
//! - `conf`     : constants
//! - `discover` : path expansion and directory traversal
//! - `spec`     : enums/options/errors
//! - `report`   : discovery report model
//! - `util`     : pattern matching and depth helpers

pub mod conf;
pub mod discover;
pub mod report;
pub mod spec;
mod util;

pub use discover::discover_sources;
pub use report::{ReportDiscover, ReportDiscoverBuilder};
pub use spec::{
    DiscoverError, EnumDiscoverDepthLimitMode, EnumDiscoverPatternMode,
    EnumDiscoverSymlinkStrategy, SpecDiscoverOptions,
};
