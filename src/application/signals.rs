//! Signal derivation
//!
//! A pure function from one dependency's advisories and registry metadata to
//! a `TrustSignal` record. Scalars the registry could not provide stay
//! `None` and never assert the related signal; absence of evidence is not
//! evidence.

use chrono::{DateTime, Utc};

use crate::config::PolicyThresholds;
use crate::domain::trust::{Advisory, Dependency, ReleaseMetadata, TrustSignal};

/// Derive the trust signals for one dependency.
///
/// `now` is injected by the orchestrator once per run so repeated derivations
/// over the same inputs agree.
pub fn derive_signals(
    dependency: &Dependency,
    advisories: &[Advisory],
    metadata: &ReleaseMetadata,
    thresholds: &PolicyThresholds,
    now: DateTime<Utc>,
) -> TrustSignal {
    let mut signal = TrustSignal {
        days_since_release: metadata.days_since_latest(now),
        releases_last_30d: metadata.releases_last_30d,
        total_releases: metadata.total_releases,
        maintainer_count: metadata.maintainer_count,
        ..TrustSignal::default()
    };

    if let Some(age_days) = signal.days_since_release {
        signal.abandoned = age_days >= thresholds.abandonment_threshold_days;
    }

    if let Some(releases) = metadata.releases_last_30d {
        signal.high_churn = releases >= thresholds.churn_high_threshold;
        signal.medium_churn = !signal.high_churn && releases >= thresholds.churn_medium_threshold;
    }

    if let Some(maintainers) = metadata.maintainer_count {
        signal.bus_factor_zero = maintainers <= thresholds.bus_factor_zero_threshold;
        signal.bus_factor_one =
            !signal.bus_factor_zero && maintainers <= thresholds.bus_factor_one_threshold;
    }

    if let Some(total) = metadata.total_releases {
        signal.low_maturity = total < thresholds.low_maturity_threshold;
    }

    // Candidates were pre-filtered by the metadata provider: within the edit
    // distance bound and strictly more popular than this package. The corpus
    // is rank-ordered, so the first candidate is the likeliest target.
    if let Some(candidate) = metadata.close_names.first() {
        signal.typosquat = true;
        signal.typosquat_target = Some(candidate.name.clone());
    }

    let version = dependency.parsed_version();

    signal.yanked = metadata.version_yanked.unwrap_or(false)
        || advisories
            .iter()
            .any(|advisory| !advisory.withdrawn && advisory.yanked);

    let mut vulnerable: Vec<&Advisory> = advisories
        .iter()
        .filter(|advisory| advisory.applies_to(&version))
        .collect();
    vulnerable.sort_by(|a, b| a.id.cmp(&b.id));

    if !vulnerable.is_empty() {
        signal.has_known_vuln = true;
        signal.known_vuln_severity = vulnerable.iter().map(|advisory| advisory.severity).max();
        signal.vulnerable_advisory_ids = vulnerable.iter().map(|a| a.id.clone()).collect();
    }

    signal.advisories = advisories.to_vec();
    signal
}
