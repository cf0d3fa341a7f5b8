//! Value objects shared across the trust evaluation pipeline

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Package ecosystems the scanner understands.
///
/// The set is closed: providers and scanners match on it exhaustively, and
/// name normalization is defined per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    #[serde(rename = "pypi")]
    PyPI,
    Cargo,
    Go,
    Maven,
    Packagist,
    NuGet,
    RubyGems,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 8] = [
        Ecosystem::Npm,
        Ecosystem::PyPI,
        Ecosystem::Cargo,
        Ecosystem::Go,
        Ecosystem::Maven,
        Ecosystem::Packagist,
        Ecosystem::NuGet,
        Ecosystem::RubyGems,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "pypi",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Go => "go",
            Ecosystem::Maven => "maven",
            Ecosystem::Packagist => "packagist",
            Ecosystem::NuGet => "nuget",
            Ecosystem::RubyGems => "rubygems",
        }
    }

    /// Ecosystem label used by the OSV batch query API.
    pub fn osv_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "PyPI",
            Ecosystem::Cargo => "crates.io",
            Ecosystem::Go => "Go",
            Ecosystem::Maven => "Maven",
            Ecosystem::Packagist => "Packagist",
            Ecosystem::NuGet => "NuGet",
            Ecosystem::RubyGems => "RubyGems",
        }
    }

    /// Ecosystem label used by the GitHub Security Advisories GraphQL API.
    pub fn ghsa_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "NPM",
            Ecosystem::PyPI => "PIP",
            Ecosystem::Cargo => "RUST",
            Ecosystem::Go => "GO",
            Ecosystem::Maven => "MAVEN",
            Ecosystem::Packagist => "COMPOSER",
            Ecosystem::NuGet => "NUGET",
            Ecosystem::RubyGems => "RUBYGEMS",
        }
    }

    pub fn parse(value: &str) -> Option<Ecosystem> {
        match value.to_ascii_lowercase().as_str() {
            "npm" => Some(Ecosystem::Npm),
            "pypi" => Some(Ecosystem::PyPI),
            "cargo" | "crates" | "crates.io" => Some(Ecosystem::Cargo),
            "go" => Some(Ecosystem::Go),
            "maven" => Some(Ecosystem::Maven),
            "packagist" | "composer" => Some(Ecosystem::Packagist),
            "nuget" => Some(Ecosystem::NuGet),
            "rubygems" | "gem" => Some(Ecosystem::RubyGems),
            _ => None,
        }
    }

    /// Normalize a package name the way the ecosystem's registry does.
    ///
    /// PyPI folds runs of `-`, `_` and `.` to a single `-` (PEP 503); npm and
    /// NuGet registries are case-insensitive; crates.io treats `-` and `_` as
    /// equivalent. The remaining registries preserve names verbatim.
    pub fn normalize_name(&self, name: &str) -> String {
        match self {
            Ecosystem::Npm | Ecosystem::NuGet => name.to_ascii_lowercase(),
            Ecosystem::PyPI => {
                let lowered = name.to_ascii_lowercase();
                let mut out = String::with_capacity(lowered.len());
                let mut last_was_sep = false;
                for ch in lowered.chars() {
                    if matches!(ch, '-' | '_' | '.') {
                        if !last_was_sep {
                            out.push('-');
                        }
                        last_was_sep = true;
                    } else {
                        out.push(ch);
                        last_was_sep = false;
                    }
                }
                out
            }
            Ecosystem::Cargo => name.to_ascii_lowercase().replace('_', "-"),
            Ecosystem::Go | Ecosystem::Maven | Ecosystem::Packagist | Ecosystem::RubyGems => {
                name.to_string()
            }
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Severity attached to an advisory by its upstream source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a severity label as emitted by advisory feeds.
    pub fn from_label(label: &str) -> Severity {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::None,
        }
    }

    /// Map a CVSS base score to a severity bucket.
    pub fn from_cvss_score(score: f64) -> Severity {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score > 0.0 {
            Severity::Low
        } else {
            Severity::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final risk classification produced by the policy engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// CI gating exit code for this level.
    pub fn exit_code(&self) -> i32 {
        match self {
            RiskLevel::Safe | RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High | RiskLevel::Critical => 2,
        }
    }
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> RiskLevel {
        match severity {
            // Sources occasionally publish advisories without a scored
            // severity; an applicable advisory still warrants at least "low".
            Severity::None | Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient, totally ordered package version.
///
/// Versions are treated as opaque strings by the rest of the pipeline; this
/// type exists only to answer range-containment questions. Parsing accepts
/// anything: dotted numeric segments followed by an optional pre-release
/// tail. Strings without a leading digit fall back to lexical ordering.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<String>,
    raw: String,
}

impl Version {
    pub fn parse(input: &str) -> Version {
        let raw = input.trim().to_string();
        let body = raw.strip_prefix('v').unwrap_or(&raw);
        // Build metadata after `+` never participates in ordering.
        let body = body.split('+').next().unwrap_or(body);

        let mut segments = Vec::new();
        let mut pre: Option<String> = None;
        for (index, part) in body.split('.').enumerate() {
            if let Some(dash) = part.find('-') {
                let (head, tail) = part.split_at(dash);
                if let Ok(value) = head.parse::<u64>() {
                    segments.push(value);
                    pre = Some(tail[1..].to_string());
                    break;
                }
            }
            match part.parse::<u64>() {
                Ok(value) => segments.push(value),
                Err(_) => {
                    if index == 0 {
                        // No numeric prefix at all: opaque version.
                        return Version {
                            segments: Vec::new(),
                            pre: Some(body.to_string()),
                            raw,
                        };
                    }
                    pre = Some(part.to_string());
                    break;
                }
            }
        }
        Version { segments, pre, raw }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for i in 0..width {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        // A pre-release sorts before the release it precedes.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Version, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Version::parse(&raw))
    }
}

/// One affected interval declared by an advisory source.
///
/// The bounds carry the inclusivity the sources declare: `introduced` is
/// inclusive, `fixed` exclusive, `last_affected` inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VersionRange {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub introduced: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fixed: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_affected: Option<Version>,
}

impl VersionRange {
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(introduced) = &self.introduced {
            if version < introduced {
                return false;
            }
        }
        if let Some(fixed) = &self.fixed {
            return version < fixed;
        }
        if let Some(last) = &self.last_affected {
            return version <= last;
        }
        true
    }
}
