//! HTML report format

use std::fmt::Write as _;

use crate::application::errors::ReportError;
use crate::application::reporting::models::Report;

/// Render a self-contained HTML document for the report.
pub fn render_html(report: &Report) -> Result<String, ReportError> {
    let mut rows = String::new();
    for verdict in &report.verdicts {
        let reasons = verdict
            .reasons
            .iter()
            .map(|reason| format!("{} ({})", reason.signal.name(), reason.severity))
            .collect::<Vec<_>>()
            .join(", ");
        let advisories = verdict
            .advisories
            .iter()
            .map(|advisory| format!("{}:{} ({})", advisory.source, advisory.id, advisory.severity))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            rows,
            "<tr class=\"sev-{sev}\"><td>{dep}</td><td>{sev}</td><td>{reasons}</td><td>{advisories}</td></tr>\n",
            sev = verdict.severity,
            dep = escape(&verdict.dependency),
            reasons = escape(&reasons),
            advisories = escape(&advisories),
        )
        .map_err(|e| ReportError::Rendering(e.to_string()))?;
    }

    let mut sources = String::new();
    for (name, status) in &report.sources {
        write!(sources, "<li>{}: {:?}</li>\n", escape(name), status)
            .map_err(|e| ReportError::Rendering(e.to_string()))?;
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Dependency trust report</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }}
tr.sev-critical td, tr.sev-high td {{ background: #fde8e8; }}
tr.sev-medium td {{ background: #fdf6e3; }}
</style>
</head>
<body>
<h1>Dependency trust report</h1>
<p>Dependencies: {total} &middot; exit code: {exit}</p>
<table>
<thead><tr><th>Dependency</th><th>Severity</th><th>Reasons</th><th>Advisories</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<h2>Sources</h2>
<ul>
{sources}</ul>
</body>
</html>
"#,
        total = report.summary.total,
        exit = report.summary.exit_code,
        rows = rows,
        sources = sources,
    ))
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
