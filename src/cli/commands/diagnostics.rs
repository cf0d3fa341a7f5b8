//! `rtx diagnostics`

use clap::Args;
use tracing::error;

use crate::cli::USAGE_EXIT;
use crate::infrastructure::diagnostics::collect_diagnostics;

#[derive(Args, Debug)]
pub struct DiagnosticsArgs {
    /// Emit diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: DiagnosticsArgs) -> i32 {
    let statuses = collect_diagnostics();

    if args.json {
        match serde_json::to_string_pretty(&statuses) {
            Ok(rendered) => println!("{rendered}"),
            Err(json_error) => {
                error!("failed to serialize diagnostics: {json_error}");
                return USAGE_EXIT;
            }
        }
    } else {
        println!("Toolchain diagnostics:");
        for status in &statuses {
            let availability = if status.available { "available" } else { "missing" };
            let detail = match (&status.error, &status.version) {
                (Some(probe_error), _) => format!("error={probe_error}"),
                (None, Some(version)) => format!("version={version}"),
                (None, None) => "version=unknown".to_string(),
            };
            let path = status
                .path
                .as_deref()
                .map(|path| format!("path={path}"))
                .unwrap_or_else(|| "path=<not found>".to_string());
            println!("- {}: {availability} ({path}, {detail})", status.name);
        }
    }

    let any_failures = statuses
        .iter()
        .any(|status| !status.available || status.error.is_some());
    i32::from(any_failures)
}
