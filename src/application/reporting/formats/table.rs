//! Terminal table rendering

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::application::reporting::models::Report;
use crate::domain::trust::RiskLevel;

fn severity_color(level: RiskLevel) -> Color {
    match level {
        RiskLevel::Critical | RiskLevel::High => Color::Red,
        RiskLevel::Medium => Color::Yellow,
        RiskLevel::Low => Color::Cyan,
        RiskLevel::Safe => Color::Green,
    }
}

/// Print the findings table and summary line to stdout.
pub fn render_table(report: &Report) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Dependency", "Verdict", "Reasons", "Advisories"]);

    for verdict in &report.verdicts {
        let reasons = if verdict.reasons.is_empty() {
            "-".to_string()
        } else {
            verdict
                .reasons
                .iter()
                .map(|reason| format!("{} ({})", reason.signal.name(), reason.severity))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let advisories = if verdict.advisories.is_empty() {
            "-".to_string()
        } else {
            verdict
                .advisories
                .iter()
                .map(|advisory| {
                    format!("{}:{} ({})", advisory.source, advisory.id, advisory.severity)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        table.add_row(vec![
            Cell::new(&verdict.dependency),
            Cell::new(verdict.severity.as_str()).fg(severity_color(verdict.severity)),
            Cell::new(reasons),
            Cell::new(advisories),
        ]);
    }

    println!("{table}");
    println!(
        "Total: {}  High: {}  Medium: {}  Exit: {}",
        report.summary.total,
        report.summary.counts.get("high").copied().unwrap_or(0).to_string().red(),
        report
            .summary
            .counts
            .get("medium")
            .copied()
            .unwrap_or(0)
            .to_string()
            .yellow(),
        report.summary.exit_code,
    );
    if !report.summary.signal_counts.is_empty() {
        let signals = report
            .summary
            .signal_counts
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{} {}", "Signals:".bold(), signals);
    }
    for (source, status) in &report.sources {
        if !matches!(status, crate::application::reporting::models::SourceStatus::Ok) {
            println!("{} {source}: {status:?}", "Source:".bold());
        }
    }
}
