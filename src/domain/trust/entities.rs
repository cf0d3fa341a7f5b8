//! Core entities of the trust evaluation pipeline

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{Ecosystem, RiskLevel, Severity, Version, VersionRange};

/// A single `(ecosystem, name, version)` observation from a manifest.
///
/// Created by scanners and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
    pub manifest: PathBuf,
    pub direct: bool,
}

impl Dependency {
    pub fn new(
        ecosystem: Ecosystem,
        name: impl Into<String>,
        version: impl Into<String>,
        manifest: impl Into<PathBuf>,
        direct: bool,
    ) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            version: version.into(),
            manifest: manifest.into(),
            direct,
        }
    }

    /// Registry-normalized name used for deduplication and lookups.
    pub fn normalized_name(&self) -> String {
        self.ecosystem.normalize_name(&self.name)
    }

    /// Stable identifier `ecosystem:name@version`.
    pub fn coordinate(&self) -> String {
        format!("{}:{}@{}", self.ecosystem, self.name, self.version)
    }

    pub fn parsed_version(&self) -> Version {
        Version::parse(&self.version)
    }
}

/// A vulnerability record from an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    pub source: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub withdrawn: bool,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub affected: Vec<VersionRange>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl Advisory {
    /// Whether this advisory applies to the given installed version.
    ///
    /// An advisory with no declared ranges was already filtered by version
    /// upstream (batch queries carry the version), so it applies as-is.
    pub fn applies_to(&self, version: &Version) -> bool {
        if self.withdrawn {
            return false;
        }
        if self.affected.is_empty() {
            return true;
        }
        self.affected.iter().any(|range| range.contains(version))
    }
}

/// A popular-name candidate near a dependency's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseName {
    pub name: String,
    /// Position in the popularity corpus; lower is more popular.
    pub rank: usize,
    pub distance: u32,
}

/// Release and maintainer metadata for one package, as fetched from its
/// ecosystem registry. Every scalar is optional: `None` means the registry
/// did not expose the value, and derived signals must not assert on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub ecosystem: Ecosystem,
    pub canonical_name: String,
    pub latest_release: Option<DateTime<Utc>>,
    pub releases_last_30d: Option<u32>,
    pub total_releases: Option<u32>,
    pub maintainer_count: Option<u32>,
    pub deprecated: Option<bool>,
    /// Whether the queried version itself was yanked from the registry.
    pub version_yanked: Option<bool>,
    pub downloads: Option<u64>,
    /// Rank of this package in the popularity corpus, when listed.
    pub popularity_rank: Option<usize>,
    #[serde(default)]
    pub close_names: Vec<CloseName>,
}

impl ReleaseMetadata {
    /// Metadata with every field unknown, used when a registry lookup fails
    /// or the ecosystem has no registry client.
    pub fn unknown(ecosystem: Ecosystem, canonical_name: impl Into<String>) -> Self {
        Self {
            ecosystem,
            canonical_name: canonical_name.into(),
            latest_release: None,
            releases_last_30d: None,
            total_releases: None,
            maintainer_count: None,
            deprecated: None,
            version_yanked: None,
            downloads: None,
            popularity_rank: None,
            close_names: Vec::new(),
        }
    }

    pub fn days_since_latest(&self, now: DateTime<Utc>) -> Option<i64> {
        self.latest_release
            .map(|latest| (now - latest).num_days().max(0))
    }
}

/// Boolean trust assertions derived for one dependency, together with the
/// scalars they were derived from and the advisories that informed them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustSignal {
    pub abandoned: bool,
    pub high_churn: bool,
    pub medium_churn: bool,
    pub bus_factor_zero: bool,
    pub bus_factor_one: bool,
    pub low_maturity: bool,
    pub typosquat: bool,
    pub yanked: bool,
    pub has_known_vuln: bool,

    pub days_since_release: Option<i64>,
    pub releases_last_30d: Option<u32>,
    pub total_releases: Option<u32>,
    pub maintainer_count: Option<u32>,
    /// Popular package this name is suspiciously close to, if any.
    pub typosquat_target: Option<String>,
    /// Highest severity among advisories that apply to the installed version.
    pub known_vuln_severity: Option<Severity>,
    /// Ids of the advisories that apply to the installed version, sorted.
    pub vulnerable_advisory_ids: Vec<String>,

    pub advisories: Vec<Advisory>,
}

/// The individual signals a verdict can cite as reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Abandoned,
    BusFactorOne,
    BusFactorZero,
    HasKnownVuln,
    HighChurn,
    LowMaturity,
    MediumChurn,
    Typosquat,
    Yanked,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Abandoned => "abandoned",
            SignalKind::BusFactorOne => "bus_factor_one",
            SignalKind::BusFactorZero => "bus_factor_zero",
            SignalKind::HasKnownVuln => "has_known_vuln",
            SignalKind::HighChurn => "high_churn",
            SignalKind::LowMaturity => "low_maturity",
            SignalKind::MediumChurn => "medium_churn",
            SignalKind::Typosquat => "typosquat",
            SignalKind::Yanked => "yanked",
        }
    }
}

/// One fired signal and the severity it contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub signal: SignalKind,
    pub severity: RiskLevel,
}

/// The policy engine's output for one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Verdict {
    pub severity: RiskLevel,
    /// Reasons sorted by severity descending, then signal name ascending.
    pub reasons: Vec<Reason>,
    /// Advisories that contributed to `has_known_vuln`, sorted by id.
    pub advisory_ids: Vec<String>,
}
