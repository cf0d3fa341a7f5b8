//! Working-set construction from scanner output
//!
//! Scanners may overlap (a lockfile and its manifest both report a package),
//! so observations are deduplicated on `(ecosystem, normalized name,
//! version)` before any provider is contacted. The output order is total so
//! downstream fan-out and the final report are deterministic.

use std::collections::BTreeMap;

use crate::domain::trust::{Dependency, Ecosystem};

/// Deduplicate and sort scanner observations into the working set.
///
/// Collisions keep the first manifest seen and mark the dependency direct if
/// any observation was direct. No record is ever dropped silently: the output
/// length equals the number of distinct dedup keys.
pub fn build_working_set(observations: Vec<Dependency>) -> Vec<Dependency> {
    let mut unique: BTreeMap<(Ecosystem, String, String), Dependency> = BTreeMap::new();
    for observation in observations {
        let key = (
            observation.ecosystem,
            observation.normalized_name(),
            observation.version.clone(),
        );
        match unique.get_mut(&key) {
            None => {
                unique.insert(key, observation);
            }
            Some(existing) => {
                existing.direct = existing.direct || observation.direct;
            }
        }
    }
    unique.into_values().collect()
}
