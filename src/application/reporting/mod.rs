//! Report assembly and rendering

pub mod formats;
pub mod models;

pub use models::{DependencyVerdict, Report, ReportSummary, SourceStatus, REPORT_SCHEMA_VERSION};
