//! `rtx pre-upgrade`

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::application::dependency_set::build_working_set;
use crate::application::Orchestrator;
use crate::cli::USAGE_EXIT;
use crate::config::Config;
use crate::domain::trust::Dependency;
use crate::infrastructure::scanners::scanners_for;

#[derive(Args, Debug)]
pub struct PreUpgradeArgs {
    /// Project root
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Package manager to target
    #[arg(long)]
    pub manager: Option<String>,

    /// Package name
    #[arg(long)]
    pub package: String,

    /// Proposed version
    #[arg(long)]
    pub version: String,
}

pub async fn execute(args: PreUpgradeArgs, config: &Config) -> i32 {
    let selection = args.manager.clone().map(|manager| vec![manager]);
    let scanners = match scanners_for(selection.as_deref()) {
        Ok(scanners) => scanners,
        Err(scan_error) => {
            error!("{scan_error}");
            return USAGE_EXIT;
        }
    };

    let mut observations: Vec<Dependency> = Vec::new();
    for scanner in &scanners {
        if selection.is_none() && !scanner.matches(&args.path) {
            continue;
        }
        if let Ok(dependencies) = scanner.scan(&args.path) {
            observations.extend(dependencies);
        }
    }

    let working_set = build_working_set(observations);
    let baseline = working_set.into_iter().find(|dependency| {
        dependency.normalized_name() == dependency.ecosystem.normalize_name(&args.package)
    });
    let Some(baseline) = baseline else {
        error!(
            "package '{}' not found in the current dependency graph",
            args.package
        );
        return USAGE_EXIT;
    };

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(provider_error) => {
            error!("failed to initialize providers: {provider_error}");
            return USAGE_EXIT;
        }
    };
    let assessment = orchestrator
        .evaluate_upgrade(baseline.clone(), &args.version, &CancellationToken::new())
        .await;

    println!(
        "Baseline: {} {} -> {}",
        baseline.name,
        baseline.version,
        assessment.baseline.highest_severity()
    );
    println!(
        "Proposed: {} {} -> {}",
        baseline.name,
        args.version,
        assessment.proposed.highest_severity()
    );
    if !assessment.added_reasons.is_empty() {
        println!(
            "{} {}",
            "New reasons:".red().bold(),
            assessment.added_reasons.join(", ")
        );
    }
    if !assessment.removed_reasons.is_empty() {
        println!(
            "{} {}",
            "Resolved reasons:".green(),
            assessment.removed_reasons.join(", ")
        );
    }

    assessment.exit_code
}
