//! JSON report format

use crate::application::errors::ReportError;
use crate::application::reporting::models::Report;

/// Serialize a report to its stable JSON form.
pub fn render_json(report: &Report) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Parse a previously persisted JSON report.
pub fn parse_json(payload: &str) -> Result<Report, ReportError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_round_trips() {
        let report = Report::build(vec!["npm".to_string()], Vec::new(), BTreeMap::new());
        let rendered = render_json(&report).expect("render");
        let parsed = parse_json(&rendered).expect("parse");
        assert_eq!(parsed.schema_version, report.schema_version);
        assert_eq!(render_json(&parsed).expect("render"), rendered);
    }
}
