//! `rtx scan`

use std::path::PathBuf;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::write_output;
use crate::application::reporting::formats::{render_html, render_json, render_table};
use crate::application::reporting::models::Report;
use crate::application::Orchestrator;
use crate::cli::{ReportFormat, USAGE_EXIT};
use crate::config::Config;
use crate::domain::trust::Dependency;
use crate::infrastructure::scanners::scanners_for;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Project root to scan
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Restrict to specific package managers (repeatable)
    #[arg(long = "manager")]
    pub managers: Vec<String>,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    pub format: ReportFormat,

    /// Destination for json/html output ("-" streams JSON to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Additionally persist the JSON report
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Additionally persist the HTML report
    #[arg(long)]
    pub html_output: Option<PathBuf>,
}

pub async fn execute(args: ScanArgs, config: &Config) -> i32 {
    let selection = (!args.managers.is_empty()).then_some(args.managers.as_slice());
    let scanners = match scanners_for(selection) {
        Ok(scanners) => scanners,
        Err(scan_error) => {
            error!("{scan_error}");
            return USAGE_EXIT;
        }
    };

    let explicit_selection = selection.is_some();
    let mut observations: Vec<Dependency> = Vec::new();
    let mut used_managers: Vec<String> = Vec::new();
    for scanner in &scanners {
        if !explicit_selection && !scanner.matches(&args.path) {
            continue;
        }
        match scanner.scan(&args.path) {
            Ok(dependencies) => {
                if !dependencies.is_empty() {
                    used_managers.push(scanner.manager().to_string());
                    observations.extend(dependencies);
                }
            }
            Err(scan_error) => {
                // An unreadable manifest degrades coverage, not the run.
                error!(manager = scanner.manager(), "{scan_error}");
            }
        }
    }
    if observations.is_empty() {
        error!("no supported manifests found under {}", args.path.display());
        return USAGE_EXIT;
    }

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(provider_error) => {
            error!("failed to initialize providers: {provider_error}");
            return USAGE_EXIT;
        }
    };
    let report = orchestrator
        .run(observations, used_managers, &CancellationToken::new())
        .await;

    if let Err(code) = render(&report, args.format, args.output.as_deref()) {
        return code;
    }
    if let Some(path) = &args.json_output {
        if let Err(code) = render(&report, ReportFormat::Json, Some(path)) {
            return code;
        }
    }
    if let Some(path) = &args.html_output {
        if let Err(code) = render(&report, ReportFormat::Html, Some(path)) {
            return code;
        }
    }

    report.exit_code()
}

pub(crate) fn render(
    report: &Report,
    format: ReportFormat,
    output: Option<&std::path::Path>,
) -> Result<(), i32> {
    match format {
        ReportFormat::Table => {
            render_table(report);
            Ok(())
        }
        ReportFormat::Json => {
            let rendered = render_json(report).map_err(|report_error| {
                error!("failed to render report: {report_error}");
                USAGE_EXIT
            })?;
            match output {
                Some(path) if path.as_os_str() != "-" => {
                    write_output(path, &rendered).map_err(|report_error| {
                        error!("{report_error}");
                        USAGE_EXIT
                    })
                }
                _ => {
                    println!("{rendered}");
                    Ok(())
                }
            }
        }
        ReportFormat::Html => match output {
            Some(path) if path.as_os_str() != "-" => {
                let rendered = render_html(report).map_err(|report_error| {
                    error!("failed to render report: {report_error}");
                    USAGE_EXIT
                })?;
                write_output(path, &rendered).map_err(|report_error| {
                    error!("{report_error}");
                    USAGE_EXIT
                })
            }
            _ => {
                error!("HTML output requires --output with a file path");
                Err(USAGE_EXIT)
            }
        },
    }
}
