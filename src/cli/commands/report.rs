//! `rtx report`

use std::path::PathBuf;

use clap::Args;
use tracing::error;

use super::scan::render;
use crate::application::reporting::formats::parse_json;
use crate::cli::{ReportFormat, REPORT_INPUT_EXIT};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Path to a previously persisted JSON report
    pub input: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    pub format: ReportFormat,

    /// Destination for json/html output
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ReportArgs) -> i32 {
    let contents = match std::fs::read_to_string(&args.input) {
        Ok(contents) => contents,
        Err(io_error) => {
            error!("failed to read report file {}: {io_error}", args.input.display());
            return REPORT_INPUT_EXIT;
        }
    };
    let report = match parse_json(&contents) {
        Ok(report) => report,
        Err(report_error) => {
            error!("{report_error}");
            return REPORT_INPUT_EXIT;
        }
    };
    if let Err(code) = render(&report, args.format, args.output.as_deref()) {
        return code;
    }
    report.exit_code()
}
