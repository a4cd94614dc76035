//! Output module for reporting on the page store
//!
//! This module handles:
//! - Printing page store statistics for `--stats`
//! - Exporting stored records as JSON for `--export-json`

mod export;
pub mod stats;

pub use export::{export_json, ExportedPage};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
