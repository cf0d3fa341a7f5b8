//! Command-line interface
//!
//! Flag values are validated by clap before anything is scheduled; no
//! network call happens on a malformed invocation. Exit codes follow the CI
//! gating contract: 0 safe/low, 1 medium, 2 high/critical, 3 usage or
//! configuration errors, 4 unreadable stored reports.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{Config, ConfigLoadError};

/// Exit code for usage and configuration errors.
pub const USAGE_EXIT: i32 = 3;
/// Exit code for unreadable or invalid stored reports.
pub const REPORT_INPUT_EXIT: i32 = 4;

/// Dependency trust scanner for multi-ecosystem projects.
#[derive(Parser, Debug)]
#[command(
    name = "rtx",
    version,
    about = "Evaluate the trust posture of a project's dependency graph",
    long_about = "rtx reconstructs a project's dependency set from its manifests, enriches it \
                  with vulnerability advisories and registry metadata, and derives a per-dependency \
                  risk classification plus an exit code suitable for CI gating."
)]
pub struct Cli {
    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan manifests and compute the trust report
    Scan(commands::scan::ScanArgs),

    /// Simulate a dependency upgrade before applying it
    PreUpgrade(commands::pre_upgrade::PreUpgradeArgs),

    /// Render a stored JSON report
    Report(commands::report::ReportArgs),

    /// List supported package managers and their manifests
    ListManagers,

    /// Inspect the local package manager toolchain
    Diagnostics(commands::diagnostics::DiagnosticsArgs),
}

/// Report output format.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
    Html,
}

/// Dispatch a parsed invocation and return the process exit code.
pub async fn run(cli: Cli) -> i32 {
    match cli.command {
        Commands::Scan(args) => match load_config() {
            Ok(config) => commands::scan::execute(args, &config).await,
            Err(code) => code,
        },
        Commands::PreUpgrade(args) => match load_config() {
            Ok(config) => commands::pre_upgrade::execute(args, &config).await,
            Err(code) => code,
        },
        Commands::Report(args) => commands::report::execute(args),
        Commands::ListManagers => commands::managers::execute(),
        Commands::Diagnostics(args) => commands::diagnostics::execute(args),
    }
}

fn load_config() -> Result<Config, i32> {
    Config::load().map_err(|error: ConfigLoadError| {
        eprintln!("configuration error: {error}");
        USAGE_EXIT
    })
}
