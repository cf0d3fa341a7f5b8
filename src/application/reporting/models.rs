//! Report data models
//!
//! The serialized report is the tool's stable machine interface: the JSON
//! schema carries a version marker, collections are sorted under a total
//! order, and nothing time- or host-dependent is included, so identical
//! inputs yield byte-identical output.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::trust::{Advisory, Ecosystem, Reason, RiskLevel, Verdict};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Outcome of one external source over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Every query the source was asked answered.
    Ok,
    /// At least one dependency could not be enriched from this source.
    Degraded,
    /// The source was turned off by configuration or authentication failure.
    Disabled,
}

/// Final classification of a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyVerdict {
    pub dependency: String,
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
    pub direct: bool,
    pub manifest: String,
    pub severity: RiskLevel,
    pub reasons: Vec<Reason>,
    pub advisory_ids: Vec<String>,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
    /// Sources that could not answer for this dependency.
    #[serde(default)]
    pub unavailable_sources: Vec<String>,
}

impl DependencyVerdict {
    pub fn from_verdict(
        dependency: &crate::domain::trust::Dependency,
        verdict: Verdict,
        advisories: Vec<Advisory>,
        unavailable_sources: Vec<String>,
    ) -> Self {
        Self {
            dependency: dependency.coordinate(),
            ecosystem: dependency.ecosystem,
            name: dependency.name.clone(),
            version: dependency.version.clone(),
            direct: dependency.direct,
            manifest: dependency.manifest.display().to_string(),
            severity: verdict.severity,
            reasons: verdict.reasons,
            advisory_ids: verdict.advisory_ids,
            advisories,
            unavailable_sources,
        }
    }
}

/// Aggregate counts over the verdict set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub direct: usize,
    pub transitive: usize,
    /// Verdict count per risk level; every level is present.
    pub counts: BTreeMap<String, usize>,
    /// Fired-signal count per signal name.
    pub signal_counts: BTreeMap<String, usize>,
    pub manager_usage: BTreeMap<String, usize>,
    pub exit_code: i32,
}

/// The ordered collection of verdicts for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: u32,
    pub managers: Vec<String>,
    pub summary: ReportSummary,
    pub verdicts: Vec<DependencyVerdict>,
    pub sources: BTreeMap<String, SourceStatus>,
}

impl Report {
    /// Assemble a report: sorts the verdicts under the total order and
    /// computes the aggregate counts and exit code.
    pub fn build(
        managers: Vec<String>,
        mut verdicts: Vec<DependencyVerdict>,
        sources: BTreeMap<String, SourceStatus>,
    ) -> Self {
        verdicts.sort_by(|a, b| {
            (
                Reverse(a.severity),
                a.ecosystem,
                a.ecosystem.normalize_name(&a.name),
                a.version.as_str(),
            )
                .cmp(&(
                    Reverse(b.severity),
                    b.ecosystem,
                    b.ecosystem.normalize_name(&b.name),
                    b.version.as_str(),
                ))
        });

        let mut counts: BTreeMap<String, usize> = RiskLevel::ALL
            .iter()
            .map(|level| (level.as_str().to_string(), 0))
            .collect();
        let mut signal_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut manager_usage: BTreeMap<String, usize> = BTreeMap::new();
        let mut direct = 0usize;
        for verdict in &verdicts {
            if let Some(count) = counts.get_mut(verdict.severity.as_str()) {
                *count += 1;
            }
            for reason in &verdict.reasons {
                *signal_counts
                    .entry(reason.signal.name().to_string())
                    .or_insert(0) += 1;
            }
            *manager_usage
                .entry(verdict.ecosystem.canonical_name().to_string())
                .or_insert(0) += 1;
            if verdict.direct {
                direct += 1;
            }
        }

        let exit_code = verdicts
            .iter()
            .map(|verdict| verdict.severity)
            .max()
            .unwrap_or(RiskLevel::Safe)
            .exit_code();

        let total = verdicts.len();
        Report {
            schema_version: REPORT_SCHEMA_VERSION,
            managers,
            summary: ReportSummary {
                total,
                direct,
                transitive: total - direct,
                counts,
                signal_counts,
                manager_usage,
                exit_code,
            },
            verdicts,
            sources,
        }
    }

    pub fn highest_severity(&self) -> RiskLevel {
        self.verdicts
            .iter()
            .map(|verdict| verdict.severity)
            .max()
            .unwrap_or(RiskLevel::Safe)
    }

    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::{Dependency, SignalKind, Verdict};

    fn verdict_row(ecosystem: Ecosystem, name: &str, version: &str, severity: RiskLevel) -> DependencyVerdict {
        let dep = Dependency::new(ecosystem, name, version, "manifest", true);
        DependencyVerdict::from_verdict(
            &dep,
            Verdict {
                severity,
                reasons: vec![Reason {
                    signal: SignalKind::Abandoned,
                    severity,
                }],
                advisory_ids: Vec::new(),
            },
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn empty_report_is_safe_with_exit_zero() {
        let report = Report::build(Vec::new(), Vec::new(), BTreeMap::new());
        assert_eq!(report.summary.total, 0);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.highest_severity(), RiskLevel::Safe);
        assert_eq!(report.summary.counts.len(), RiskLevel::ALL.len());
    }

    #[test]
    fn verdicts_sort_severity_desc_then_coordinates() {
        let report = Report::build(
            Vec::new(),
            vec![
                verdict_row(Ecosystem::PyPI, "b", "1.0.0", RiskLevel::Low),
                verdict_row(Ecosystem::Npm, "z", "1.0.0", RiskLevel::Critical),
                verdict_row(Ecosystem::Npm, "a", "2.0.0", RiskLevel::Low),
                verdict_row(Ecosystem::Npm, "a", "1.0.0", RiskLevel::Low),
            ],
            BTreeMap::new(),
        );
        let order: Vec<_> = report
            .verdicts
            .iter()
            .map(|v| (v.name.as_str(), v.version.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("z", "1.0.0"), ("a", "1.0.0"), ("a", "2.0.0"), ("b", "1.0.0")]
        );
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn summary_counts_cover_all_levels() {
        let report = Report::build(
            Vec::new(),
            vec![verdict_row(Ecosystem::Npm, "a", "1.0.0", RiskLevel::Medium)],
            BTreeMap::new(),
        );
        assert_eq!(report.summary.counts["medium"], 1);
        assert_eq!(report.summary.counts["critical"], 0);
        assert_eq!(report.summary.signal_counts["abandoned"], 1);
        assert_eq!(report.exit_code(), 1);
    }
}
