//! Advisory provider capability
//!
//! Every advisory source, batch or per-package, token-authenticated or
//! anonymous, is presented to the orchestrator through this one capability:
//! given a batch of dependencies, return a per-dependency outcome. A
//! provider must account for every input: a dependency is either mapped to
//! its advisories (possibly none) or marked unavailable, never omitted, so
//! the orchestrator can tell "no advisories" from "source failed".

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::trust::{Advisory, Dependency};

/// Per-dependency result of one batch enrichment call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Advisories per dependency coordinate, sorted by advisory id.
    pub advisories: HashMap<String, Vec<Advisory>>,
    /// Coordinates this source could not answer for.
    pub unavailable: BTreeSet<String>,
}

impl BatchOutcome {
    pub fn record(&mut self, coordinate: String, mut advisories: Vec<Advisory>) {
        advisories.sort_by(|a, b| a.id.cmp(&b.id));
        self.advisories.insert(coordinate, advisories);
    }

    pub fn mark_unavailable(&mut self, coordinate: String) {
        self.unavailable.insert(coordinate);
    }

    /// Outcome marking an entire batch unavailable.
    pub fn unavailable_for(batch: &[Dependency]) -> Self {
        let mut outcome = Self::default();
        for dependency in batch {
            outcome.mark_unavailable(dependency.coordinate());
        }
        outcome
    }

    /// Every input dependency must appear on exactly one side.
    pub fn covers(&self, batch: &[Dependency]) -> bool {
        batch.iter().all(|dependency| {
            let coordinate = dependency.coordinate();
            self.advisories.contains_key(&coordinate) || self.unavailable.contains(&coordinate)
        })
    }
}

/// A single upstream advisory source.
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    /// Stable source tag used in cache keys and the report's sources section.
    fn name(&self) -> &'static str;

    /// Largest batch this source accepts per call.
    fn batch_size(&self) -> usize;

    /// Whether the source participates in this run. A provider may flip this
    /// off mid-run after an authentication failure.
    fn is_enabled(&self) -> bool;

    /// Enrich a batch of dependencies. Must observe `cancel` between network
    /// turns and never return partial advisory records after cancellation.
    async fn enrich_batch(&self, batch: &[Dependency], cancel: &CancellationToken) -> BatchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::Ecosystem;

    #[test]
    fn outcome_accounts_for_every_dependency() {
        let deps = vec![
            Dependency::new(Ecosystem::Npm, "a", "1.0.0", "m", true),
            Dependency::new(Ecosystem::Npm, "b", "1.0.0", "m", true),
        ];
        let mut outcome = BatchOutcome::default();
        outcome.record(deps[0].coordinate(), Vec::new());
        assert!(!outcome.covers(&deps));
        outcome.mark_unavailable(deps[1].coordinate());
        assert!(outcome.covers(&deps));
    }

    #[test]
    fn recorded_advisories_are_sorted_by_id() {
        let mut outcome = BatchOutcome::default();
        let advisory = |id: &str| Advisory {
            id: id.to_string(),
            source: "osv.dev".to_string(),
            severity: Default::default(),
            summary: String::new(),
            withdrawn: false,
            yanked: false,
            affected: Vec::new(),
            references: Vec::new(),
        };
        outcome.record("npm:a@1.0.0".into(), vec![advisory("B"), advisory("A")]);
        let ids: Vec<_> = outcome.advisories["npm:a@1.0.0"]
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
